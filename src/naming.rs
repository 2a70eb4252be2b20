//! generated identifier names
//!
//! every template takes type names from [`crate::analyzer::Operation`];
//! this module is the only place they are derived.

use crate::operation::OperationKind;
use heck::ToUpperCamelCase;

pub fn pascal_case(name: &str) -> String {
    name.to_upper_camel_case()
}

/// `{PascalCase(name)}{Kind}`, e.g. `GetUserQuery`
pub fn operation_type_name(name: &str, kind: OperationKind) -> String {
    format!("{}{}", pascal_case(name), kind.type_suffix())
}

/// `{PascalCase(name)}{Kind}Variables`
pub fn variables_type_name(name: &str, kind: OperationKind) -> String {
    format!("{}Variables", operation_type_name(name, kind))
}

pub fn fragment_type_name(name: &str) -> String {
    format!("{}Fragment", pascal_case(name))
}

/// quote a string as a single-quoted typescript literal
pub fn ts_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

//! schema lookups for interactive tooling
//!
//! unknown names are answered with an `{ "error": ... }` object instead of an
//! error, so callers can render the negative result directly.

use crate::schema::{FieldDef, InputValueDef, Schema, SchemaType, TypeKind};
use serde::Serialize;

/// a lookup result, serialized either as the info or as `{ "error": ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaLookup<T> {
    Found(T),
    Error { error: String },
}

impl<T> SchemaLookup<T> {
    fn error(message: String) -> Self {
        SchemaLookup::Error { error: message }
    }

    pub fn found(self) -> Option<T> {
        match self {
            SchemaLookup::Found(info) => Some(info),
            SchemaLookup::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_fields: Vec<InputValueInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    /// concrete types of unions and interfaces
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<InputValueInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValueInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub has_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionInfo {
    pub name: String,
    pub possible_types: Vec<String>,
}

/// describe a named type
pub fn type_info(schema: &Schema, name: &str) -> SchemaLookup<TypeInfo> {
    let Some(ty) = schema.get(name) else {
        return SchemaLookup::error(not_found(name));
    };
    SchemaLookup::Found(describe(schema, ty))
}

/// list the members of a union
pub fn union_info(schema: &Schema, name: &str) -> SchemaLookup<UnionInfo> {
    let Some(ty) = schema.get(name) else {
        return SchemaLookup::error(not_found(name));
    };
    if ty.kind != TypeKind::Union {
        return SchemaLookup::error(format!("Type \"{name}\" is not a union"));
    }
    SchemaLookup::Found(UnionInfo {
        name: ty.name.clone(),
        possible_types: owned(schema.possible_types(name)),
    })
}

/// type names, optionally restricted to one kind, sorted
pub fn list_types(schema: &Schema, kind: Option<TypeKind>) -> Vec<String> {
    schema
        .types()
        .filter(|ty| kind.map_or(true, |kind| ty.kind == kind))
        .map(|ty| ty.name.clone())
        .collect()
}

fn describe(schema: &Schema, ty: &SchemaType) -> TypeInfo {
    let possible_types = if ty.is_abstract() {
        owned(schema.possible_types(&ty.name))
    } else {
        Vec::new()
    };
    TypeInfo {
        name: ty.name.clone(),
        kind: ty.kind,
        description: ty.description.clone(),
        fields: ty.fields.iter().map(field_info).collect(),
        input_fields: ty.input_fields.iter().map(input_value_info).collect(),
        interfaces: ty.interfaces.clone(),
        possible_types,
        enum_values: ty.enum_values.clone(),
    }
}

fn field_info(field: &FieldDef) -> FieldInfo {
    FieldInfo {
        name: field.name.clone(),
        ty: field.ty.to_string(),
        arguments: field.arguments.iter().map(input_value_info).collect(),
        description: field.description.clone(),
    }
}

fn input_value_info(value: &InputValueDef) -> InputValueInfo {
    InputValueInfo {
        name: value.name.clone(),
        ty: value.ty.to_string(),
        has_default: value.has_default,
        description: value.description.clone(),
    }
}

fn not_found(name: &str) -> String {
    format!("Type \"{name}\" not found in schema")
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::test_schema;
    use serde_json::json;

    #[test]
    fn test_unknown_type_is_error_object() {
        let lookup = type_info(&test_schema(), "Missing");
        assert_eq!(
            serde_json::to_value(&lookup).unwrap(),
            json!({"error": "Type \"Missing\" not found in schema"})
        );
        assert!(lookup.found().is_none());
    }

    #[test]
    fn test_type_info_object() {
        let info = type_info(&test_schema(), "User").found().unwrap();
        assert_eq!(info.kind, TypeKind::Object);
        assert_eq!(info.interfaces, vec!["Node".to_string()]);
        let friends = info.fields.iter().find(|f| f.name == "friends").unwrap();
        assert_eq!(friends.ty, "[User!]!");
        assert_eq!(friends.arguments[0].name, "first");
        assert!(friends.arguments[0].has_default);

        let value = serde_json::to_value(type_info(&test_schema(), "Role")).unwrap();
        assert_eq!(
            value,
            json!({"name": "Role", "kind": "ENUM", "enumValues": ["ADMIN", "EDITOR", "VIEWER"]})
        );
    }

    #[test]
    fn test_type_info_interface_lists_implementations() {
        let info = type_info(&test_schema(), "Node").found().unwrap();
        assert_eq!(info.possible_types, vec!["Post".to_string(), "User".to_string()]);
    }

    #[test]
    fn test_union_info() {
        let schema = test_schema();
        let info = union_info(&schema, "SearchResult").found().unwrap();
        assert_eq!(info.possible_types, vec!["Post".to_string(), "User".to_string()]);

        assert_eq!(
            serde_json::to_value(union_info(&schema, "User")).unwrap(),
            json!({"error": "Type \"User\" is not a union"})
        );
        assert_eq!(
            serde_json::to_value(union_info(&schema, "Nope")).unwrap(),
            json!({"error": "Type \"Nope\" not found in schema"})
        );
    }

    #[test]
    fn test_list_types() {
        let schema = test_schema();
        assert_eq!(
            list_types(&schema, Some(TypeKind::InputObject)),
            vec!["CreateUserInput".to_string(), "UserFilter".to_string()]
        );
        assert!(list_types(&schema, None).contains(&"Boolean".to_string()));
    }
}

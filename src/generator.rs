//! typescript type generation
//!
//! turns analyzed operations into one canonical [`GeneratorOutput`]. every
//! template formats this output; none of them walks the schema itself.

use crate::analyzer::{AnalyzedDocuments, Fragment, Operation, Selection};
use crate::naming::{self, ts_string};
use crate::operation::OperationKind;
use crate::schema::{Schema, TypeKind, TypeRef};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// generator settings
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// custom scalar name -> typescript type
    pub scalars: BTreeMap<String, String>,
}

/// kind of a generated declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Enum,
    Input,
    Fragment,
    Operation,
    Variables,
}

impl CodeKind {
    pub const ALL: [CodeKind; 5] = [
        CodeKind::Enum,
        CodeKind::Input,
        CodeKind::Fragment,
        CodeKind::Operation,
        CodeKind::Variables,
    ];
}

/// how runtime values are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFlavor {
    /// `.d.ts` declarations
    Declaration,
    /// plain javascript module code
    Executable,
}

/// one generated declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub kind: CodeKind,
    pub name: String,
    pub type_source: String,
}

/// a graphql enum with its values, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<String>,
}

/// result of one generation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorOutput {
    operations: Vec<Operation>,
    code: Vec<GeneratedCode>,
    enums: Vec<EnumDecl>,
}

impl GeneratorOutput {
    /// output with no operations, used before a schema is available
    pub fn empty() -> Self {
        Self::default()
    }

    /// operations sorted by kind, then name
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// operations of one kind, sorted by name
    pub fn operations_of(&self, kind: OperationKind) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> = self
            .operations
            .iter()
            .filter(|op| op.operation_type == kind)
            .collect();
        ops.sort_by(|a, b| a.graphql_name.cmp(&b.graphql_name));
        ops
    }

    pub fn code(&self) -> &[GeneratedCode] {
        &self.code
    }

    pub fn enums(&self) -> &[EnumDecl] {
        &self.enums
    }

    /// type-only declarations of the given kinds, in generation order
    pub fn build_types(&self, kinds: &[CodeKind]) -> String {
        let parts: Vec<&str> = self
            .code
            .iter()
            .filter(|code| kinds.contains(&code.kind))
            .map(|code| code.type_source.as_str())
            .collect();
        join_blocks(&parts)
    }

    /// enum value objects
    pub fn build_values(&self, flavor: OutputFlavor) -> String {
        let parts: Vec<String> = self
            .enums
            .iter()
            .map(|decl| match flavor {
                OutputFlavor::Declaration => {
                    let mut out = format!("export declare const {}: {{\n", decl.name);
                    for value in &decl.values {
                        out.push_str(&format!("  readonly {}: {};\n", value, ts_string(value)));
                    }
                    out.push_str("};");
                    out
                }
                OutputFlavor::Executable => {
                    let mut out = format!("export const {} = Object.freeze({{\n", decl.name);
                    for value in &decl.values {
                        out.push_str(&format!("  {}: {},\n", value, ts_string(value)));
                    }
                    out.push_str("});");
                    out
                }
            })
            .collect();
        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        join_blocks(&parts)
    }
}

fn join_blocks(parts: &[&str]) -> String {
    if parts.is_empty() {
        return String::new();
    }
    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// generate typescript declarations for analyzed documents
pub fn generate_types(
    schema: &Schema,
    analyzed: AnalyzedDocuments,
    options: &GeneratorOptions,
) -> GeneratorOutput {
    let printer = TypePrinter {
        schema,
        fragments: &analyzed.fragments,
        options,
    };
    let mut code = Vec::new();
    let mut enums = Vec::new();

    for name in analyzed.enums() {
        let Some(ty) = schema.get(&name) else {
            continue;
        };
        let literals: Vec<String> = ty.enum_values.iter().map(|v| ts_string(v)).collect();
        code.push(GeneratedCode {
            kind: CodeKind::Enum,
            name: name.clone(),
            type_source: format!("export type {} = {};", name, literals.join(" | ")),
        });
        enums.push(EnumDecl {
            name,
            values: ty.enum_values.clone(),
        });
    }

    for name in analyzed.inputs() {
        let Some(ty) = schema.get(&name) else {
            continue;
        };
        let mut out = format!("export type {name} = {{\n");
        for field in &ty.input_fields {
            let optional = !field.ty.is_non_null() || field.has_default;
            out.push_str(&format!(
                "  {}{}: {};\n",
                field.name,
                if optional { "?" } else { "" },
                printer.input_type(&field.ty)
            ));
        }
        out.push_str("};");
        code.push(GeneratedCode {
            kind: CodeKind::Input,
            name,
            type_source: out,
        });
    }

    for fragment in analyzed.fragments.values() {
        code.push(GeneratedCode {
            kind: CodeKind::Fragment,
            name: naming::fragment_type_name(&fragment.name),
            type_source: format!(
                "export type {} = {};",
                naming::fragment_type_name(&fragment.name),
                printer.fragment_shape(fragment)
            ),
        });
    }

    for op in &analyzed.operations {
        let selections: Vec<&Selection> = op.selections.iter().collect();
        code.push(GeneratedCode {
            kind: CodeKind::Operation,
            name: op.type_name.clone(),
            type_source: format!(
                "export type {} = {};",
                op.type_name,
                printer.object_shape(&op.root_type, &op.root_type, &selections, 0)
            ),
        });
        code.push(GeneratedCode {
            kind: CodeKind::Variables,
            name: op.variables_type_name.clone(),
            type_source: printer.variables_type(op),
        });
    }

    GeneratorOutput {
        operations: analyzed.operations,
        code,
        enums,
    }
}

struct TypePrinter<'a> {
    schema: &'a Schema,
    fragments: &'a BTreeMap<String, Fragment>,
    options: &'a GeneratorOptions,
}

struct FieldEntry<'a> {
    field_name: &'a str,
    selections: Vec<&'a Selection>,
}

impl<'a> TypePrinter<'a> {
    fn scalar(&self, name: &str) -> String {
        if let Some(mapped) = self.options.scalars.get(name) {
            return mapped.clone();
        }
        match name {
            "ID" | "String" => "string",
            "Int" | "Float" => "number",
            "Boolean" => "boolean",
            _ => "any",
        }
        .to_string()
    }

    fn input_type(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::NonNull(inner) => self.input_non_null(inner),
            other => format!("{} | null", self.input_non_null(other)),
        }
    }

    fn input_non_null(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::NonNull(inner) => self.input_non_null(inner),
            TypeRef::List(inner) => format!("Array<{}>", self.input_type(inner)),
            TypeRef::Named(name) => match self.schema.get(name).map(|ty| ty.kind) {
                Some(TypeKind::Scalar) | None => self.scalar(name),
                Some(_) => name.clone(),
            },
        }
    }

    fn variables_type(&self, op: &Operation) -> String {
        if op.variables.is_empty() {
            return format!("export type {} = Record<string, never>;", op.variables_type_name);
        }
        let mut out = format!("export type {} = {{\n", op.variables_type_name);
        for var in &op.variables {
            out.push_str(&format!(
                "  {}{}: {};\n",
                var.name,
                if var.is_required() { "" } else { "?" },
                self.input_type(&var.ty)
            ));
        }
        out.push_str("};");
        out
    }

    fn fragment_shape(&self, fragment: &'a Fragment) -> String {
        let selections: Vec<&Selection> = fragment.selections.iter().collect();
        self.selection_shape(&fragment.type_condition, &selections, 0)
    }

    fn output_type(&self, ty: &TypeRef, selections: &[&'a Selection], indent: usize) -> String {
        match ty {
            TypeRef::NonNull(inner) => self.output_non_null(inner, selections, indent),
            other => format!("{} | null", self.output_non_null(other, selections, indent)),
        }
    }

    fn output_non_null(&self, ty: &TypeRef, selections: &[&'a Selection], indent: usize) -> String {
        match ty {
            TypeRef::NonNull(inner) => self.output_non_null(inner, selections, indent),
            TypeRef::List(inner) => {
                format!("Array<{}>", self.output_type(inner, selections, indent))
            }
            TypeRef::Named(name) => match self.schema.get(name).map(|ty| ty.kind) {
                Some(TypeKind::Enum) => name.clone(),
                Some(TypeKind::Object | TypeKind::Interface | TypeKind::Union) => {
                    self.selection_shape(name, selections, indent)
                }
                _ => self.scalar(name),
            },
        }
    }

    /// shape of a composite type; abstract types narrowed by type conditions
    /// become a union with one member per possible type
    fn selection_shape(&self, parent: &str, selections: &[&'a Selection], indent: usize) -> String {
        let is_abstract = self
            .schema
            .get(parent)
            .map(|ty| ty.is_abstract())
            .unwrap_or(false);
        if !is_abstract || !self.narrows(parent, selections) {
            return self.object_shape(parent, parent, selections, indent);
        }
        self.schema
            .possible_types(parent)
            .into_iter()
            .map(|concrete| self.object_shape(concrete, parent, selections, indent))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn narrows(&self, parent: &str, selections: &[&'a Selection]) -> bool {
        selections.iter().any(|selection| match selection {
            Selection::Field { .. } => false,
            Selection::FragmentSpread { name } => match self.fragments.get(name) {
                Some(fragment) if fragment.type_condition != parent => true,
                Some(fragment) => {
                    let inner: Vec<&Selection> = fragment.selections.iter().collect();
                    self.narrows(parent, &inner)
                }
                None => false,
            },
            Selection::InlineFragment {
                type_condition,
                selections,
            } => match type_condition {
                Some(cond) if cond != parent => true,
                _ => {
                    let inner: Vec<&Selection> = selections.iter().collect();
                    self.narrows(parent, &inner)
                }
            },
        })
    }

    /// `concrete` is the runtime type the shape describes; it equals
    /// `parent` unless an abstract type is being split into members
    fn object_shape(
        &self,
        concrete: &str,
        parent: &str,
        selections: &[&'a Selection],
        indent: usize,
    ) -> String {
        let mut fields: IndexMap<String, FieldEntry<'a>> = IndexMap::new();
        self.collect_fields(concrete, parent, selections, &mut fields);
        if fields.is_empty() {
            return "{}".to_string();
        }

        let pad = "  ".repeat(indent);
        let mut out = String::from("{\n");
        for (key, entry) in &fields {
            let ty = if entry.field_name == "__typename" {
                self.typename_literal(concrete)
            } else {
                match self.schema.field(concrete, entry.field_name) {
                    Some(field) => self.output_type(&field.ty, &entry.selections, indent + 1),
                    None => "unknown".to_string(),
                }
            };
            out.push_str(&format!("{pad}  {key}: {ty};\n"));
        }
        out.push_str(&pad);
        out.push('}');
        out
    }

    fn typename_literal(&self, type_name: &str) -> String {
        let possible = self.schema.possible_types(type_name);
        if possible.is_empty() {
            return "string".to_string();
        }
        possible
            .into_iter()
            .map(ts_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn applies(&self, condition: &str, concrete: &str, parent: &str) -> bool {
        if concrete == parent {
            condition == parent || self.schema.condition_applies(condition, concrete)
        } else {
            self.schema.condition_applies(condition, concrete)
        }
    }

    fn collect_fields(
        &self,
        concrete: &str,
        parent: &str,
        selections: &[&'a Selection],
        out: &mut IndexMap<String, FieldEntry<'a>>,
    ) {
        for selection in selections {
            match *selection {
                Selection::Field {
                    alias,
                    name,
                    selections: sub,
                } => {
                    let key = alias.clone().unwrap_or_else(|| name.clone());
                    let entry = out.entry(key).or_insert_with(|| FieldEntry {
                        field_name: name.as_str(),
                        selections: Vec::new(),
                    });
                    entry.selections.extend(sub.iter());
                }
                Selection::FragmentSpread { name } => {
                    if let Some(fragment) = self.fragments.get(name) {
                        if self.applies(&fragment.type_condition, concrete, parent) {
                            let inner: Vec<&'a Selection> = fragment.selections.iter().collect();
                            self.collect_fields(concrete, parent, &inner, out);
                        }
                    }
                }
                Selection::InlineFragment {
                    type_condition,
                    selections: sub,
                } => {
                    let applies = match type_condition {
                        Some(cond) => self.applies(cond, concrete, parent),
                        None => true,
                    };
                    if applies {
                        let inner: Vec<&'a Selection> = sub.iter().collect();
                        self.collect_fields(concrete, parent, &inner, out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::analyzer::tests::doc;
    use crate::schema::tests::test_schema;

    fn generate_one(source: &str) -> GeneratorOutput {
        let schema = test_schema();
        let analyzed = analyze(&schema, &[doc("ops.graphql", source)], None).unwrap();
        generate_types(&schema, analyzed, &GeneratorOptions::default())
    }

    fn find<'o>(output: &'o GeneratorOutput, name: &str) -> &'o str {
        output
            .code()
            .iter()
            .find(|code| code.name == name)
            .map(|code| code.type_source.as_str())
            .unwrap_or_else(|| panic!("missing {name}"))
    }

    #[test]
    fn test_result_and_variables_types() {
        let output =
            generate_one("query userById($id: ID!) { userById(id: $id) { id name role } }");
        assert_eq!(
            find(&output, "UserByIdQuery"),
            "export type UserByIdQuery = {\n  userById: {\n    id: string;\n    name: string | null;\n    role: Role;\n  } | null;\n};"
        );
        assert_eq!(
            find(&output, "UserByIdQueryVariables"),
            "export type UserByIdQueryVariables = {\n  id: string;\n};"
        );
        assert_eq!(
            find(&output, "Role"),
            "export type Role = 'ADMIN' | 'EDITOR' | 'VIEWER';"
        );
    }

    #[test]
    fn test_optional_variables() {
        let output =
            generate_one("query optionalVariable($value: Int) { optionalVariable(value: $value) }");
        assert_eq!(
            find(&output, "OptionalVariableQueryVariables"),
            "export type OptionalVariableQueryVariables = {\n  value?: number | null;\n};"
        );
        assert_eq!(
            find(&output, "OptionalVariableQuery"),
            "export type OptionalVariableQuery = {\n  optionalVariable: number | null;\n};"
        );
    }

    #[test]
    fn test_no_variables_type() {
        let output = generate_one("query ping { ping }");
        assert_eq!(
            find(&output, "PingQueryVariables"),
            "export type PingQueryVariables = Record<string, never>;"
        );
    }

    #[test]
    fn test_fragments_are_merged_and_aliased() {
        let output = generate_one(
            r#"
            fragment userFields on User { id email }
            query users { list: users { ...userFields id friends { name } } }
            "#,
        );
        assert_eq!(
            find(&output, "UsersQuery"),
            "export type UsersQuery = {\n  list: Array<{\n    id: string;\n    email: string;\n    friends: Array<{\n      name: string | null;\n    }>;\n  }>;\n};"
        );
        assert_eq!(
            find(&output, "UserFieldsFragment"),
            "export type UserFieldsFragment = {\n  id: string;\n  email: string;\n};"
        );
    }

    #[test]
    fn test_union_narrowing() {
        let output = generate_one(
            r#"
            query search($text: String!) {
              search(text: $text) {
                __typename
                ... on User { name }
                ... on Post { title }
              }
            }
            "#,
        );
        let source = find(&output, "SearchQuery");
        assert!(source.contains("__typename: 'Post';\n    title: string;"));
        assert!(source.contains("__typename: 'User';\n    name: string | null;"));
        assert!(source.contains("} | {"));
    }

    #[test]
    fn test_interface_without_narrowing() {
        let output = generate_one("query node($id: ID!) { node(id: $id) { __typename id } }");
        assert_eq!(
            find(&output, "NodeQuery"),
            "export type NodeQuery = {\n  node: {\n    __typename: 'Post' | 'User';\n    id: string;\n  } | null;\n};"
        );
    }

    #[test]
    fn test_custom_scalar_mapping() {
        let schema = test_schema();
        let analyzed = analyze(
            &schema,
            &[doc("ops.graphql", "query users { users { createdAt } }")],
            None,
        )
        .unwrap();
        let mut options = GeneratorOptions::default();
        let unmapped = generate_types(&schema, analyzed.clone(), &options);
        assert!(find(&unmapped, "UsersQuery").contains("createdAt: any | null;"));

        options
            .scalars
            .insert("DateTime".to_string(), "string".to_string());
        let mapped = generate_types(&schema, analyzed, &options);
        assert!(find(&mapped, "UsersQuery").contains("createdAt: string | null;"));
    }

    #[test]
    fn test_input_types_and_enum_values() {
        let output = generate_one(
            "mutation createUser($input: CreateUserInput!) { createUser(input: $input) { id } }",
        );
        assert_eq!(
            find(&output, "UserFilter"),
            "export type UserFilter = {\n  role?: Role | null;\n  name?: string | null;\n  order?: SortOrder | null;\n};"
        );
        assert_eq!(
            output.build_values(OutputFlavor::Executable),
            "export const Role = Object.freeze({\n  ADMIN: 'ADMIN',\n  EDITOR: 'EDITOR',\n  VIEWER: 'VIEWER',\n});\n\nexport const SortOrder = Object.freeze({\n  ASC: 'ASC',\n  DESC: 'DESC',\n});\n"
        );
        assert!(output
            .build_values(OutputFlavor::Declaration)
            .starts_with("export declare const Role: {\n  readonly ADMIN: 'ADMIN';"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let source = r#"
            query b { users { id role } }
            query a($filter: UserFilter) { users(filter: $filter) { id } }
            mutation c { ping }
        "#;
        let first = generate_one(source);
        let second = generate_one(source);
        assert_eq!(
            first.build_types(&CodeKind::ALL),
            second.build_types(&CodeKind::ALL)
        );
        let names: Vec<_> = first
            .operations_of(OperationKind::Query)
            .iter()
            .map(|op| op.graphql_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_output() {
        let output = GeneratorOutput::empty();
        assert!(output.operations().is_empty());
        assert_eq!(output.build_types(&CodeKind::ALL), "");
        assert_eq!(output.build_values(OutputFlavor::Executable), "");
    }
}

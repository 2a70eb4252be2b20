//! schema model
//!
//! an owned view of a graphql sdl document. the analyzer and generator only
//! ever see this model, never the parser's borrowed ast.

use crate::error::{Error, Result};
use crate::operation::OperationKind;
use graphql_parser::schema::{
    parse_schema, Definition, Field, InputValue, Type, TypeDefinition, TypeExtension,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const BUILTIN_SCALARS: [&str; 5] = ["ID", "String", "Int", "Float", "Boolean"];

/// kind of a named schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

/// a type reference as written in sdl or in variable definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub(crate) fn from_parsed<'a>(ty: &Type<'a, String>) -> Self {
        match ty {
            Type::NamedType(name) => TypeRef::Named(name.clone()),
            Type::ListType(inner) => TypeRef::List(Box::new(TypeRef::from_parsed(inner))),
            Type::NonNullType(inner) => TypeRef::NonNull(Box::new(TypeRef::from_parsed(inner))),
        }
    }

    /// innermost named type
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// argument or input object field
#[derive(Debug, Clone)]
pub struct InputValueDef {
    pub name: String,
    pub ty: TypeRef,
    pub has_default: bool,
    pub description: Option<String>,
}

/// output field on an object or interface
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: Vec<InputValueDef>,
    pub description: Option<String>,
}

/// a named type in the schema
#[derive(Debug, Clone)]
pub struct SchemaType {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,
    /// output fields (objects and interfaces)
    pub fields: Vec<FieldDef>,
    /// input fields (input objects)
    pub input_fields: Vec<InputValueDef>,
    /// implemented interfaces (objects and interfaces)
    pub interfaces: Vec<String>,
    /// union members
    pub members: Vec<String>,
    /// enum values in declaration order
    pub enum_values: Vec<String>,
}

impl SchemaType {
    fn new(name: &str, kind: TypeKind, description: Option<&String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.cloned(),
            fields: Vec::new(),
            input_fields: Vec::new(),
            interfaces: Vec::new(),
            members: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// scalars and enums
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar | TypeKind::Enum)
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Union)
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject
        )
    }
}

/// parsed graphql schema
#[derive(Debug, Clone)]
pub struct Schema {
    types: BTreeMap<String, SchemaType>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
}

impl Schema {
    /// parse an sdl document
    pub fn parse(sdl: &str) -> Result<Self> {
        let document = parse_schema::<String>(sdl).map_err(|err| Error::Parse {
            path: "<schema>".to_string(),
            message: err.to_string(),
        })?;

        let mut types: BTreeMap<String, SchemaType> = BTreeMap::new();
        let mut roots: Option<(Option<String>, Option<String>, Option<String>)> = None;
        let mut extensions = Vec::new();

        for def in &document.definitions {
            match def {
                Definition::SchemaDefinition(schema) => {
                    roots = Some((
                        schema.query.clone(),
                        schema.mutation.clone(),
                        schema.subscription.clone(),
                    ));
                }
                Definition::TypeDefinition(ty) => {
                    let converted = convert_type(ty);
                    types.insert(converted.name.clone(), converted);
                }
                Definition::TypeExtension(ext) => extensions.push(ext),
                Definition::DirectiveDefinition(_) => {}
            }
        }

        for ext in extensions {
            apply_extension(&mut types, ext);
        }

        for scalar in BUILTIN_SCALARS {
            types
                .entry(scalar.to_string())
                .or_insert_with(|| SchemaType::new(scalar, TypeKind::Scalar, None));
        }

        let default_root = |name: &str| types.contains_key(name).then(|| name.to_string());
        let (query_type, mutation_type, subscription_type) = match roots {
            Some(roots) => roots,
            None => (
                default_root("Query"),
                default_root("Mutation"),
                default_root("Subscription"),
            ),
        };

        Ok(Self {
            types,
            query_type,
            mutation_type,
            subscription_type,
        })
    }

    pub fn get(&self, name: &str) -> Option<&SchemaType> {
        self.types.get(name)
    }

    /// all named types, sorted by name
    pub fn types(&self) -> impl Iterator<Item = &SchemaType> {
        self.types.values()
    }

    /// root object type for an operation kind
    pub fn root_type(&self, kind: OperationKind) -> Option<&SchemaType> {
        let name = match kind {
            OperationKind::Query => self.query_type.as_deref(),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }?;
        self.types.get(name)
    }

    /// field lookup on an object or interface type
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.types.get(type_name)?.field(field_name)
    }

    /// concrete object types a value of `name` can have, sorted by name
    pub fn possible_types(&self, name: &str) -> Vec<&str> {
        let Some(ty) = self.types.get(name) else {
            return Vec::new();
        };
        match ty.kind {
            TypeKind::Object => vec![ty.name.as_str()],
            TypeKind::Union => {
                let members: BTreeSet<&str> = ty.members.iter().map(String::as_str).collect();
                members.into_iter().collect()
            }
            TypeKind::Interface => self
                .types
                .values()
                .filter(|candidate| {
                    candidate.kind == TypeKind::Object
                        && candidate.interfaces.iter().any(|iface| iface == name)
                })
                .map(|candidate| candidate.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// true if a selection with type condition `condition` applies to the
    /// concrete object type `concrete`
    pub fn condition_applies(&self, condition: &str, concrete: &str) -> bool {
        condition == concrete || self.possible_types(condition).contains(&concrete)
    }
}

fn convert_type<'a>(ty: &TypeDefinition<'a, String>) -> SchemaType {
    match ty {
        TypeDefinition::Scalar(scalar) => {
            SchemaType::new(&scalar.name, TypeKind::Scalar, scalar.description.as_ref())
        }
        TypeDefinition::Object(obj) => {
            let mut out = SchemaType::new(&obj.name, TypeKind::Object, obj.description.as_ref());
            out.fields = obj.fields.iter().map(convert_field).collect();
            out.interfaces = obj.implements_interfaces.clone();
            out
        }
        TypeDefinition::Interface(iface) => {
            let mut out =
                SchemaType::new(&iface.name, TypeKind::Interface, iface.description.as_ref());
            out.fields = iface.fields.iter().map(convert_field).collect();
            out.interfaces = iface.implements_interfaces.clone();
            out
        }
        TypeDefinition::Union(union_ty) => {
            let mut out =
                SchemaType::new(&union_ty.name, TypeKind::Union, union_ty.description.as_ref());
            out.members = union_ty.types.clone();
            out
        }
        TypeDefinition::Enum(enum_ty) => {
            let mut out =
                SchemaType::new(&enum_ty.name, TypeKind::Enum, enum_ty.description.as_ref());
            out.enum_values = enum_ty.values.iter().map(|v| v.name.clone()).collect();
            out
        }
        TypeDefinition::InputObject(input) => {
            let mut out =
                SchemaType::new(&input.name, TypeKind::InputObject, input.description.as_ref());
            out.input_fields = input.fields.iter().map(convert_input_value).collect();
            out
        }
    }
}

fn apply_extension<'a>(types: &mut BTreeMap<String, SchemaType>, ext: &TypeExtension<'a, String>) {
    match ext {
        TypeExtension::Object(obj) => {
            if let Some(target) = types.get_mut(&obj.name) {
                target.fields.extend(obj.fields.iter().map(convert_field));
                target
                    .interfaces
                    .extend(obj.implements_interfaces.iter().cloned());
            }
        }
        TypeExtension::Interface(iface) => {
            if let Some(target) = types.get_mut(&iface.name) {
                target.fields.extend(iface.fields.iter().map(convert_field));
            }
        }
        TypeExtension::Union(union_ty) => {
            if let Some(target) = types.get_mut(&union_ty.name) {
                target.members.extend(union_ty.types.iter().cloned());
            }
        }
        TypeExtension::Enum(enum_ty) => {
            if let Some(target) = types.get_mut(&enum_ty.name) {
                target
                    .enum_values
                    .extend(enum_ty.values.iter().map(|v| v.name.clone()));
            }
        }
        TypeExtension::InputObject(input) => {
            if let Some(target) = types.get_mut(&input.name) {
                target
                    .input_fields
                    .extend(input.fields.iter().map(convert_input_value));
            }
        }
        TypeExtension::Scalar(_) => {}
    }
}

fn convert_field<'a>(field: &Field<'a, String>) -> FieldDef {
    FieldDef {
        name: field.name.clone(),
        ty: TypeRef::from_parsed(&field.field_type),
        arguments: field.arguments.iter().map(convert_input_value).collect(),
        description: field.description.clone(),
    }
}

fn convert_input_value<'a>(value: &InputValue<'a, String>) -> InputValueDef {
    InputValueDef {
        name: value.name.clone(),
        ty: TypeRef::from_parsed(&value.value_type),
        has_default: value.default_value.is_some(),
        description: value.description.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_SCHEMA: &str = r#"
        scalar DateTime

        enum Role { ADMIN EDITOR VIEWER }
        enum SortOrder { ASC DESC }

        interface Node { id: ID! }

        type User implements Node {
          id: ID!
          name: String
          email: String!
          role: Role!
          createdAt: DateTime
          friends(first: Int = 10): [User!]!
        }

        type Post implements Node {
          id: ID!
          title: String!
          author: User
        }

        union SearchResult = User | Post

        input UserFilter {
          role: Role
          name: String
          order: SortOrder = ASC
        }

        input CreateUserInput {
          name: String!
          role: Role!
          filter: UserFilter
        }

        type Query {
          userById(id: ID!): User
          users(filter: UserFilter): [User!]!
          search(text: String!): [SearchResult!]!
          node(id: ID!): Node
          ping: Boolean!
          optionalVariable(value: Int): Int
        }

        type Mutation {
          createUser(input: CreateUserInput!): User!
          ping: Boolean!
        }

        type Subscription {
          userCreated: User!
        }
    "#;

    pub(crate) fn test_schema() -> Schema {
        Schema::parse(TEST_SCHEMA).unwrap()
    }

    #[test]
    fn test_roots_default_to_conventional_names() {
        let schema = test_schema();
        assert_eq!(schema.root_type(OperationKind::Query).unwrap().name, "Query");
        assert_eq!(
            schema.root_type(OperationKind::Mutation).unwrap().name,
            "Mutation"
        );
        assert_eq!(
            schema.root_type(OperationKind::Subscription).unwrap().name,
            "Subscription"
        );
    }

    #[test]
    fn test_explicit_schema_definition() {
        let schema = Schema::parse(
            "schema { query: RootQuery } type RootQuery { ok: Boolean } type Mutation { x: Int }",
        )
        .unwrap();
        assert_eq!(
            schema.root_type(OperationKind::Query).unwrap().name,
            "RootQuery"
        );
        assert!(schema.root_type(OperationKind::Mutation).is_none());
    }

    #[test]
    fn test_possible_types() {
        let schema = test_schema();
        assert_eq!(schema.possible_types("Node"), vec!["Post", "User"]);
        assert_eq!(schema.possible_types("SearchResult"), vec!["Post", "User"]);
        assert_eq!(schema.possible_types("User"), vec!["User"]);
        assert!(schema.condition_applies("Node", "User"));
        assert!(!schema.condition_applies("Post", "User"));
    }

    #[test]
    fn test_builtin_scalars_and_extensions() {
        let schema =
            Schema::parse("type Query { a: Int } extend type Query { b: String }").unwrap();
        assert!(schema.get("Boolean").is_some());
        assert!(schema.field("Query", "b").is_some());
    }

    #[test]
    fn test_type_ref_display() {
        let schema = test_schema();
        let field = schema.field("User", "friends").unwrap();
        assert_eq!(field.ty.to_string(), "[User!]!");
        assert_eq!(field.ty.base_name(), "User");
        assert!(field.arguments[0].has_default);
    }

    #[test]
    fn test_parse_error() {
        let err = Schema::parse("type Query {").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}

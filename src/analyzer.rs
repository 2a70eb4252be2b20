//! operation analyzer
//!
//! parses raw documents, validates every operation and fragment against the
//! schema, and extracts the metadata the generator and templates consume.

use crate::error::{Error, Result};
use crate::loader::RawDocument;
use crate::naming;
use crate::operation::OperationKind;
use crate::schema::{Schema, TypeKind, TypeRef};
use graphql_parser::query::{
    self as ast, parse_query, Definition, OperationDefinition, TypeCondition,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// a selection inside an operation or fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field {
        alias: Option<String>,
        name: String,
        selections: Vec<Selection>,
    },
    FragmentSpread {
        name: String,
    },
    InlineFragment {
        type_condition: Option<String>,
        selections: Vec<Selection>,
    },
}

/// declared operation variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub ty: TypeRef,
    pub has_default: bool,
}

impl VariableDef {
    /// the variable must be supplied by the caller
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && !self.has_default
    }
}

/// named things an operation references transitively
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dependencies {
    pub fragments: BTreeSet<String>,
    pub enums: BTreeSet<String>,
    pub inputs: BTreeSet<String>,
}

/// one named query, mutation, or subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub graphql_name: String,
    pub operation_type: OperationKind,
    pub type_name: String,
    pub variables_type_name: String,
    pub has_variables: bool,
    pub needs_variables: bool,
    pub file_path: String,
    pub dependencies: Dependencies,
    pub variables: Vec<VariableDef>,
    pub selections: Vec<Selection>,
    /// root object type name in the schema
    pub root_type: String,
    /// executable document: the operation followed by its fragments
    pub document: String,
}

/// a named fragment definition
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub type_condition: String,
    pub file_path: String,
    pub selections: Vec<Selection>,
    pub source: String,
    pub dependencies: Dependencies,
}

/// analyzer result
#[derive(Debug, Clone, Default)]
pub struct AnalyzedDocuments {
    /// sorted by kind, then name
    pub operations: Vec<Operation>,
    pub fragments: BTreeMap<String, Fragment>,
}

impl AnalyzedDocuments {
    /// every enum referenced by any operation or fragment
    pub fn enums(&self) -> BTreeSet<String> {
        let from_fragments = self
            .fragments
            .values()
            .flat_map(|frag| frag.dependencies.enums.iter().cloned());
        self.operations
            .iter()
            .flat_map(|op| op.dependencies.enums.iter().cloned())
            .chain(from_fragments)
            .collect()
    }

    /// every input object referenced by any operation
    pub fn inputs(&self) -> BTreeSet<String> {
        self.operations
            .iter()
            .flat_map(|op| op.dependencies.inputs.iter().cloned())
            .collect()
    }
}

struct ParsedOperation {
    kind: OperationKind,
    name: String,
    variables: Vec<VariableDef>,
    selections: Vec<Selection>,
    file_path: String,
    source: String,
}

/// analyze all documents of one generation pass
pub fn analyze(
    schema: &Schema,
    documents: &[RawDocument],
    root: Option<&Path>,
) -> Result<AnalyzedDocuments> {
    let mut parsed_ops: Vec<ParsedOperation> = Vec::new();
    let mut fragments: BTreeMap<String, Fragment> = BTreeMap::new();
    let mut seen_ops: HashMap<(OperationKind, String), String> = HashMap::new();
    let mut seen_type_names: HashMap<String, String> = HashMap::new();
    let mut seen_fragment_type_names: HashMap<String, String> = HashMap::new();

    for doc in documents {
        let file_path = relative_file_path(&doc.path, root);
        let document = parse_query::<String>(&doc.source).map_err(|err| Error::Parse {
            path: file_path.clone(),
            message: err.to_string(),
        })?;

        for def in &document.definitions {
            let source = print_definition(def);
            match def {
                Definition::Fragment(frag) => {
                    let TypeCondition::On(type_condition) = &frag.type_condition;
                    if let Some(existing) = fragments.get(&frag.name) {
                        return Err(Error::DuplicateFragment {
                            name: frag.name.clone(),
                            first: existing.file_path.clone(),
                            second: file_path.clone(),
                        });
                    }
                    let type_name = naming::fragment_type_name(&frag.name);
                    if let Some(other) = seen_fragment_type_names.get(&type_name) {
                        return Err(Error::FragmentTypeNameCollision {
                            name: frag.name.clone(),
                            other: other.clone(),
                            type_name,
                        });
                    }
                    seen_fragment_type_names.insert(type_name, frag.name.clone());
                    fragments.insert(
                        frag.name.clone(),
                        Fragment {
                            name: frag.name.clone(),
                            type_condition: type_condition.clone(),
                            file_path: file_path.clone(),
                            selections: convert_selection_set(&frag.selection_set),
                            source,
                            dependencies: Dependencies::default(),
                        },
                    );
                }
                Definition::Operation(op) => {
                    let (kind, name, var_defs, selection_set) = match op {
                        OperationDefinition::SelectionSet(_) => {
                            return Err(Error::AnonymousOperation {
                                path: file_path.clone(),
                            })
                        }
                        OperationDefinition::Query(q) => (
                            OperationKind::Query,
                            &q.name,
                            &q.variable_definitions,
                            &q.selection_set,
                        ),
                        OperationDefinition::Mutation(m) => (
                            OperationKind::Mutation,
                            &m.name,
                            &m.variable_definitions,
                            &m.selection_set,
                        ),
                        OperationDefinition::Subscription(s) => (
                            OperationKind::Subscription,
                            &s.name,
                            &s.variable_definitions,
                            &s.selection_set,
                        ),
                    };
                    let Some(name) = name.clone() else {
                        return Err(Error::AnonymousOperation {
                            path: file_path.clone(),
                        });
                    };

                    if let Some(first) = seen_ops.get(&(kind, name.clone())) {
                        return Err(Error::DuplicateOperation {
                            kind,
                            name,
                            first: first.clone(),
                            second: file_path.clone(),
                        });
                    }
                    let type_name = naming::operation_type_name(&name, kind);
                    if let Some(other) = seen_type_names.get(&type_name) {
                        return Err(Error::TypeNameCollision {
                            kind,
                            name,
                            other: other.clone(),
                            type_name,
                        });
                    }
                    seen_ops.insert((kind, name.clone()), file_path.clone());
                    seen_type_names.insert(type_name, name.clone());

                    parsed_ops.push(ParsedOperation {
                        kind,
                        name,
                        variables: var_defs
                            .iter()
                            .map(|var| VariableDef {
                                name: var.name.clone(),
                                ty: TypeRef::from_parsed(&var.var_type),
                                has_default: var.default_value.is_some(),
                            })
                            .collect(),
                        selections: convert_selection_set(selection_set),
                        file_path: file_path.clone(),
                        source,
                    });
                }
            }
        }
    }

    for fragment in fragments.values() {
        validate_fragment(schema, fragment, &fragments)?;
    }
    check_fragment_cycles(&fragments)?;

    let fragment_deps: Vec<(String, Dependencies)> = fragments
        .values()
        .map(|fragment| {
            let mut deps = Dependencies::default();
            collect_selection_dependencies(
                schema,
                &fragment.type_condition,
                &fragment.selections,
                &fragments,
                &mut deps,
            );
            (fragment.name.clone(), deps)
        })
        .collect();
    for (name, deps) in fragment_deps {
        if let Some(fragment) = fragments.get_mut(&name) {
            fragment.dependencies = deps;
        }
    }

    let mut operations = Vec::with_capacity(parsed_ops.len());
    for parsed in parsed_ops {
        operations.push(build_operation(schema, parsed, &fragments)?);
    }
    operations.sort_by(|a, b| {
        (a.operation_type, &a.graphql_name).cmp(&(b.operation_type, &b.graphql_name))
    });

    Ok(AnalyzedDocuments {
        operations,
        fragments,
    })
}

fn build_operation(
    schema: &Schema,
    parsed: ParsedOperation,
    fragments: &BTreeMap<String, Fragment>,
) -> Result<Operation> {
    let path = parsed.file_path.as_str();
    let root = schema.root_type(parsed.kind).ok_or_else(|| {
        Error::validation(
            path,
            format!(
                "{} \"{}\" requires a {} root type, but the schema has none",
                parsed.kind, parsed.name, parsed.kind
            ),
        )
    })?;

    let mut seen_vars = BTreeSet::new();
    for var in &parsed.variables {
        if !seen_vars.insert(var.name.as_str()) {
            return Err(Error::validation(
                path,
                format!("variable ${} is declared twice in \"{}\"", var.name, parsed.name),
            ));
        }
        let base = var.ty.base_name();
        match schema.get(base) {
            Some(ty) if ty.is_input() => {}
            Some(_) => {
                return Err(Error::validation(
                    path,
                    format!("variable ${} has non-input type \"{}\"", var.name, base),
                ))
            }
            None => {
                return Err(Error::validation(
                    path,
                    format!("variable ${} has unknown type \"{}\"", var.name, base),
                ))
            }
        }
    }

    validate_selections(schema, &root.name, &parsed.selections, fragments, path)?;

    let mut dependencies = Dependencies::default();
    collect_selection_dependencies(
        schema,
        &root.name,
        &parsed.selections,
        fragments,
        &mut dependencies,
    );
    for var in &parsed.variables {
        collect_input_dependencies(schema, var.ty.base_name(), &mut dependencies);
    }

    let mut document = parsed.source;
    for fragment_name in &dependencies.fragments {
        if let Some(fragment) = fragments.get(fragment_name) {
            document.push_str("\n\n");
            document.push_str(&fragment.source);
        }
    }

    let has_variables = !parsed.variables.is_empty();
    let needs_variables = parsed.variables.iter().any(VariableDef::is_required);

    Ok(Operation {
        type_name: naming::operation_type_name(&parsed.name, parsed.kind),
        variables_type_name: naming::variables_type_name(&parsed.name, parsed.kind),
        graphql_name: parsed.name,
        operation_type: parsed.kind,
        has_variables,
        needs_variables,
        file_path: parsed.file_path,
        dependencies,
        variables: parsed.variables,
        selections: parsed.selections,
        root_type: root.name.clone(),
        document,
    })
}

fn validate_fragment(
    schema: &Schema,
    fragment: &Fragment,
    fragments: &BTreeMap<String, Fragment>,
) -> Result<()> {
    let path = fragment.file_path.as_str();
    match schema.get(&fragment.type_condition) {
        Some(ty) if !ty.is_leaf() && ty.kind != TypeKind::InputObject => {}
        Some(_) => {
            return Err(Error::validation(
                path,
                format!(
                    "fragment \"{}\" has non-composite type condition \"{}\"",
                    fragment.name, fragment.type_condition
                ),
            ))
        }
        None => {
            return Err(Error::validation(
                path,
                format!(
                    "fragment \"{}\" references unknown type \"{}\"",
                    fragment.name, fragment.type_condition
                ),
            ))
        }
    }
    validate_selections(
        schema,
        &fragment.type_condition,
        &fragment.selections,
        fragments,
        path,
    )
}

fn validate_selections(
    schema: &Schema,
    parent: &str,
    selections: &[Selection],
    fragments: &BTreeMap<String, Fragment>,
    path: &str,
) -> Result<()> {
    for selection in selections {
        match selection {
            Selection::Field {
                name, selections, ..
            } => {
                if name == "__typename" {
                    if !selections.is_empty() {
                        return Err(Error::validation(
                            path,
                            "field \"__typename\" cannot have a selection set",
                        ));
                    }
                    continue;
                }
                let field = schema.field(parent, name).ok_or_else(|| {
                    Error::validation(
                        path,
                        format!("field \"{name}\" not found on type \"{parent}\""),
                    )
                })?;
                let base = field.ty.base_name();
                let base_ty = schema.get(base).ok_or_else(|| {
                    Error::validation(
                        path,
                        format!("field \"{parent}.{name}\" has unknown type \"{base}\""),
                    )
                })?;
                if base_ty.is_leaf() && !selections.is_empty() {
                    return Err(Error::validation(
                        path,
                        format!("field \"{name}\" of type \"{base}\" cannot have a selection set"),
                    ));
                }
                if !base_ty.is_leaf() && selections.is_empty() {
                    return Err(Error::validation(
                        path,
                        format!("field \"{name}\" of type \"{base}\" must have a selection set"),
                    ));
                }
                validate_selections(schema, base, selections, fragments, path)?;
            }
            Selection::FragmentSpread { name } => {
                let Some(fragment) = fragments.get(name) else {
                    return Err(Error::validation(
                        path,
                        format!("unknown fragment \"{name}\""),
                    ));
                };
                if !types_overlap(schema, parent, &fragment.type_condition) {
                    return Err(Error::validation(
                        path,
                        format!(
                            "fragment \"{name}\" on \"{}\" can never apply to \"{parent}\"",
                            fragment.type_condition
                        ),
                    ));
                }
            }
            Selection::InlineFragment {
                type_condition,
                selections,
            } => {
                let target = type_condition.as_deref().unwrap_or(parent);
                match schema.get(target) {
                    Some(ty) if !ty.is_leaf() && ty.kind != TypeKind::InputObject => {}
                    _ => {
                        return Err(Error::validation(
                            path,
                            format!("inline fragment references unknown type \"{target}\""),
                        ))
                    }
                }
                if !types_overlap(schema, parent, target) {
                    return Err(Error::validation(
                        path,
                        format!("inline fragment on \"{target}\" can never apply to \"{parent}\""),
                    ));
                }
                validate_selections(schema, target, selections, fragments, path)?;
            }
        }
    }
    check_response_keys(
        schema,
        parent,
        selections,
        fragments,
        &mut HashMap::new(),
        &mut BTreeSet::new(),
        path,
    )
}

/// some concrete type satisfies both `parent` and `condition`
fn types_overlap(schema: &Schema, parent: &str, condition: &str) -> bool {
    if parent == condition {
        return true;
    }
    let candidates = schema.possible_types(condition);
    schema
        .possible_types(parent)
        .iter()
        .any(|ty| candidates.contains(ty))
}

/// a response key must select the same field wherever it appears, unless the
/// two fields sit on distinct object types and can never both apply
fn check_response_keys<'s>(
    schema: &Schema,
    parent: &'s str,
    selections: &'s [Selection],
    fragments: &'s BTreeMap<String, Fragment>,
    seen: &mut HashMap<&'s str, Vec<(&'s str, &'s str)>>,
    visited: &mut BTreeSet<&'s str>,
    path: &str,
) -> Result<()> {
    let is_object = |name: &str| schema.get(name).map(|ty| ty.kind) == Some(TypeKind::Object);
    for selection in selections {
        match selection {
            Selection::Field { alias, name, .. } => {
                let key = alias.as_deref().unwrap_or(name.as_str());
                let entries = seen.entry(key).or_default();
                for &(other_name, other_parent) in entries.iter() {
                    let exclusive =
                        other_parent != parent && is_object(parent) && is_object(other_parent);
                    if other_name != name.as_str() && !exclusive {
                        return Err(Error::validation(
                            path,
                            format!(
                                "response key \"{key}\" selects both \"{other_name}\" and \"{name}\""
                            ),
                        ));
                    }
                }
                entries.push((name.as_str(), parent));
            }
            Selection::FragmentSpread { name } => {
                if !visited.insert(name.as_str()) {
                    continue;
                }
                if let Some(fragment) = fragments.get(name) {
                    check_response_keys(
                        schema,
                        &fragment.type_condition,
                        &fragment.selections,
                        fragments,
                        seen,
                        visited,
                        path,
                    )?;
                }
            }
            Selection::InlineFragment {
                type_condition,
                selections,
            } => {
                let target = type_condition.as_deref().unwrap_or(parent);
                check_response_keys(schema, target, selections, fragments, seen, visited, path)?;
            }
        }
    }
    Ok(())
}

fn check_fragment_cycles(fragments: &BTreeMap<String, Fragment>) -> Result<()> {
    fn visit<'a>(
        name: &'a str,
        fragments: &'a BTreeMap<String, Fragment>,
        stack: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        let Some(fragment) = fragments.get(name) else {
            return Ok(());
        };
        if stack.contains(&name) {
            return Err(Error::validation(
                fragment.file_path.clone(),
                format!("fragment \"{name}\" spreads itself"),
            ));
        }
        stack.push(name);
        for spread in spreads(&fragment.selections) {
            visit(spread, fragments, stack, done)?;
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    let mut done = BTreeSet::new();
    for name in fragments.keys() {
        visit(name, fragments, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn spreads(selections: &[Selection]) -> Vec<&str> {
    let mut out = Vec::new();
    for selection in selections {
        match selection {
            Selection::FragmentSpread { name } => out.push(name.as_str()),
            Selection::Field { selections, .. } | Selection::InlineFragment { selections, .. } => {
                out.extend(spreads(selections))
            }
        }
    }
    out
}

fn collect_selection_dependencies(
    schema: &Schema,
    parent: &str,
    selections: &[Selection],
    fragments: &BTreeMap<String, Fragment>,
    deps: &mut Dependencies,
) {
    for selection in selections {
        match selection {
            Selection::Field {
                name, selections, ..
            } => {
                let Some(field) = schema.field(parent, name) else {
                    continue;
                };
                let base = field.ty.base_name();
                match schema.get(base).map(|ty| ty.kind) {
                    Some(TypeKind::Enum) => {
                        deps.enums.insert(base.to_string());
                    }
                    Some(_) if !selections.is_empty() => {
                        collect_selection_dependencies(schema, base, selections, fragments, deps)
                    }
                    _ => {}
                }
            }
            Selection::FragmentSpread { name } => {
                if !deps.fragments.insert(name.clone()) {
                    continue;
                }
                if let Some(fragment) = fragments.get(name) {
                    collect_selection_dependencies(
                        schema,
                        &fragment.type_condition,
                        &fragment.selections,
                        fragments,
                        deps,
                    );
                }
            }
            Selection::InlineFragment {
                type_condition,
                selections,
            } => {
                let target = type_condition.as_deref().unwrap_or(parent);
                collect_selection_dependencies(schema, target, selections, fragments, deps);
            }
        }
    }
}

fn collect_input_dependencies(schema: &Schema, type_name: &str, deps: &mut Dependencies) {
    let Some(ty) = schema.get(type_name) else {
        return;
    };
    match ty.kind {
        TypeKind::Enum => {
            deps.enums.insert(ty.name.clone());
        }
        TypeKind::InputObject => {
            if !deps.inputs.insert(ty.name.clone()) {
                return;
            }
            for field in &ty.input_fields {
                collect_input_dependencies(schema, field.ty.base_name(), deps);
            }
        }
        _ => {}
    }
}

fn convert_selection_set<'a>(set: &ast::SelectionSet<'a, String>) -> Vec<Selection> {
    set.items
        .iter()
        .map(|item| match item {
            ast::Selection::Field(field) => Selection::Field {
                alias: field.alias.clone(),
                name: field.name.clone(),
                selections: convert_selection_set(&field.selection_set),
            },
            ast::Selection::FragmentSpread(spread) => Selection::FragmentSpread {
                name: spread.fragment_name.clone(),
            },
            ast::Selection::InlineFragment(inline) => Selection::InlineFragment {
                type_condition: inline
                    .type_condition
                    .as_ref()
                    .map(|TypeCondition::On(name)| name.clone()),
                selections: convert_selection_set(&inline.selection_set),
            },
        })
        .collect()
}

fn print_definition<'a>(def: &Definition<'a, String>) -> String {
    let document = ast::Document {
        definitions: vec![def.clone()],
    };
    document.to_string().trim_end().to_string()
}

/// make an absolute document path relative to the project root
pub fn relative_file_path(path: &str, root: Option<&Path>) -> String {
    let candidate = Path::new(path);
    match root {
        Some(root) if candidate.is_absolute() => candidate
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.to_string()),
        _ => path.to_string(),
    }
}

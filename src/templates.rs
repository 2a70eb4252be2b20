//! output templates
//!
//! every emitted artifact is a [`Template`]: an output path plus a render
//! function. generated templates format a [`GeneratorOutput`]; static ones
//! only depend on paths and configuration.

use crate::config::ModuleConfig;
use crate::error::{Error, Result};
use crate::generator::{CodeKind, GeneratorOutput, OutputFlavor};
use crate::naming::ts_string;
use crate::operation::{endpoint_path, OperationKind};
use crate::server::OperationDocuments;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// renders from paths and configuration only
pub type StaticSource = fn(&PathHelper) -> Result<String>;

/// renders from the generator output
pub type GeneratedSource = fn(&GeneratorOutput, &PathHelper) -> Result<String>;

pub const OPERATIONS_TYPES_PATH: &str = "graphql-operations/index.d.ts";
pub const OPERATIONS_VALUES_PATH: &str = "graphql-operations/index.js";
pub const OPERATION_TYPES_PATH: &str = "graphql-middleware/operation-types.d.ts";
pub const RESPONSE_PATH: &str = "graphql-middleware/response.d.ts";
pub const DOCUMENTS_PATH: &str = "graphql-middleware/documents.json";
pub const SOURCES_PATH: &str = "graphql-middleware/sources.js";
pub const ENDPOINTS_PATH: &str = "graphql-middleware/endpoints.js";
pub const CLIENT_OPTIONS_PATH: &str = "graphql-middleware/client-options.js";
pub const SERVER_OPTIONS_PATH: &str = "graphql-middleware/server-options.js";
pub const HELPERS_PATH: &str = "graphql-middleware/helpers.js";

const HEADER: &str = "// generated by graphql-middleware, do not edit\n";

/// a named output artifact
#[derive(Debug, Clone, Copy)]
pub struct Template {
    /// path relative to the build dir
    pub output_path: &'static str,
    pub static_source: Option<StaticSource>,
    pub generated_source: Option<GeneratedSource>,
}

impl Template {
    /// render the template; static templates ignore `output`
    pub fn render(&self, output: &GeneratorOutput, helper: &PathHelper) -> Result<String> {
        match (self.generated_source, self.static_source) {
            (Some(source), _) => source(output, helper),
            (None, Some(source)) => source(helper),
            (None, None) => Err(Error::Config(format!(
                "template {} has no source",
                self.output_path
            ))),
        }
    }

    pub fn is_static(&self) -> bool {
        self.generated_source.is_none()
    }
}

/// every artifact written by a build pass
pub const TEMPLATES: &[Template] = &[
    Template {
        output_path: OPERATIONS_TYPES_PATH,
        static_source: None,
        generated_source: Some(operations_declarations),
    },
    Template {
        output_path: OPERATIONS_VALUES_PATH,
        static_source: None,
        generated_source: Some(operations_values),
    },
    Template {
        output_path: OPERATION_TYPES_PATH,
        static_source: None,
        generated_source: Some(operation_types),
    },
    Template {
        output_path: RESPONSE_PATH,
        static_source: None,
        generated_source: Some(response_types),
    },
    Template {
        output_path: DOCUMENTS_PATH,
        static_source: None,
        generated_source: Some(documents_json),
    },
    Template {
        output_path: SOURCES_PATH,
        static_source: None,
        generated_source: Some(operation_sources),
    },
    Template {
        output_path: ENDPOINTS_PATH,
        static_source: None,
        generated_source: Some(endpoints),
    },
    Template {
        output_path: CLIENT_OPTIONS_PATH,
        static_source: Some(client_options),
        generated_source: None,
    },
    Template {
        output_path: SERVER_OPTIONS_PATH,
        static_source: Some(server_options),
        generated_source: None,
    },
    Template {
        output_path: HELPERS_PATH,
        static_source: Some(helpers),
        generated_source: None,
    },
];

/// paths and settings available to templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHelper {
    root_dir: PathBuf,
    build_dir: PathBuf,
    schema_path: PathBuf,
    client_options_path: Option<PathBuf>,
    server_options_path: Option<PathBuf>,
    server_api_prefix: String,
}

impl PathHelper {
    pub fn new(config: &ModuleConfig) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            build_dir: config.build_dir.clone(),
            schema_path: config.schema_path.clone(),
            client_options_path: config.client_options_path.clone(),
            server_options_path: config.server_options_path.clone(),
            server_api_prefix: config.server_api_prefix.clone(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn server_api_prefix(&self) -> &str {
        &self.server_api_prefix
    }

    /// absolute location of a template output
    pub fn output_path(&self, template_path: &str) -> PathBuf {
        self.build_dir.join(template_path)
    }

    /// module specifier importing `target` from the template at `from`
    ///
    /// relative targets resolve against the root dir; script extensions are
    /// dropped.
    pub fn relative_import(&self, from: &str, target: &Path) -> String {
        let from_path = self.output_path(from);
        let from_dir = from_path.parent().unwrap_or(&self.build_dir);
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.root_dir.join(target)
        };

        let mut specifier = relative_path(from_dir, &target)
            .to_string_lossy()
            .replace('\\', "/");
        for ext in [".d.ts", ".ts", ".mjs", ".js"] {
            if let Some(stripped) = specifier.strip_suffix(ext) {
                specifier = stripped.to_string();
                break;
            }
        }
        if specifier.starts_with("../") {
            specifier
        } else {
            format!("./{specifier}")
        }
    }
}

fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();
    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}

fn operations_declarations(output: &GeneratorOutput, _helper: &PathHelper) -> Result<String> {
    let types = output.build_types(&CodeKind::ALL);
    let values = output.build_values(OutputFlavor::Declaration);
    Ok(module(&[&types, &values]))
}

fn operations_values(output: &GeneratorOutput, _helper: &PathHelper) -> Result<String> {
    let values = output.build_values(OutputFlavor::Executable);
    Ok(module(&[&values]))
}

fn operation_types(output: &GeneratorOutput, helper: &PathHelper) -> Result<String> {
    let mut imports = BTreeSet::new();
    for op in output.operations() {
        imports.insert(op.type_name.as_str());
        imports.insert(op.variables_type_name.as_str());
    }

    let mut out = String::from(HEADER);
    push_type_imports(&mut out, &imports, OPERATION_TYPES_PATH, helper);

    for kind in OperationKind::ALL {
        let ops = output.operations_of(kind);
        out.push('\n');
        if ops.is_empty() {
            out.push_str(&format!("export type {} = {{}};\n", kind.type_suffix()));
            continue;
        }
        out.push_str(&format!("export type {} = {{\n", kind.type_suffix()));
        for op in ops {
            out.push_str(&format!(
                "  {}: [{}, {}, {}];\n",
                op.graphql_name, op.variables_type_name, op.needs_variables, op.type_name
            ));
        }
        out.push_str("};\n");
    }
    Ok(out)
}

fn response_types(output: &GeneratorOutput, helper: &PathHelper) -> Result<String> {
    let result_types: Vec<&str> = output
        .operations()
        .iter()
        .map(|op| op.type_name.as_str())
        .collect();
    let imports: BTreeSet<&str> = result_types.iter().copied().collect();

    let mut out = String::from(HEADER);
    push_type_imports(&mut out, &imports, RESPONSE_PATH, helper);
    out.push_str(
        "\nexport type GraphqlResponseError = {\n  \
         message: string;\n  \
         locations?: Array<{ line: number; column: number }>;\n  \
         path?: Array<string | number>;\n  \
         extensions?: Record<string, unknown>;\n\
         };\n",
    );
    out.push_str(
        "\nexport type GraphqlResponse<T> = {\n  \
         data: T;\n  \
         errors?: Array<GraphqlResponseError>;\n  \
         [key: string]: unknown;\n\
         };\n",
    );
    let union = if result_types.is_empty() {
        "never".to_string()
    } else {
        result_types.join(" | ")
    };
    out.push_str(&format!("\nexport type OperationResponse = {union};\n"));
    Ok(out)
}

fn documents_json(output: &GeneratorOutput, _helper: &PathHelper) -> Result<String> {
    let mut json = OperationDocuments::from_output(output).to_json_pretty()?;
    json.push('\n');
    Ok(json)
}

fn operation_sources(output: &GeneratorOutput, _helper: &PathHelper) -> Result<String> {
    let mut out = String::from(HEADER);
    out.push('\n');
    if output.operations().is_empty() {
        out.push_str("export const operationSources = {};\n");
        return Ok(out);
    }
    out.push_str("export const operationSources = {\n");
    for op in output.operations() {
        let key = format!("{}:{}", op.operation_type, op.graphql_name);
        out.push_str(&format!(
            "  {}: {},\n",
            ts_string(&key),
            ts_string(&op.file_path)
        ));
    }
    out.push_str("};\n");
    Ok(out)
}

fn endpoints(output: &GeneratorOutput, helper: &PathHelper) -> Result<String> {
    let mut out = String::from(HEADER);
    out.push_str("\nexport const endpoints = {\n");
    for kind in OperationKind::ALL {
        let ops = output.operations_of(kind);
        if ops.is_empty() {
            out.push_str(&format!("  {kind}: {{}},\n"));
            continue;
        }
        out.push_str(&format!("  {kind}: {{\n"));
        for op in ops {
            let path = endpoint_path(&helper.server_api_prefix, kind, &op.graphql_name);
            out.push_str(&format!("    {}: {},\n", op.graphql_name, ts_string(&path)));
        }
        out.push_str("  },\n");
    }
    out.push_str("};\n");
    Ok(out)
}

fn client_options(helper: &PathHelper) -> Result<String> {
    Ok(options_module(
        helper,
        CLIENT_OPTIONS_PATH,
        "clientOptions",
        helper.client_options_path.as_deref(),
    ))
}

fn server_options(helper: &PathHelper) -> Result<String> {
    Ok(options_module(
        helper,
        SERVER_OPTIONS_PATH,
        "serverOptions",
        helper.server_options_path.as_deref(),
    ))
}

fn helpers(helper: &PathHelper) -> Result<String> {
    let mut out = String::from(HEADER);
    out.push_str(&format!(
        "\nexport const serverApiPrefix = {};\n",
        ts_string(helper.server_api_prefix.trim_end_matches('/'))
    ));
    out.push_str(
        "\nexport function getEndpoint(operation, operationName) {\n  \
         return `${serverApiPrefix}/${operation}/${operationName}`;\n\
         }\n",
    );
    Ok(out)
}

fn options_module(helper: &PathHelper, from: &str, name: &str, path: Option<&Path>) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    match path {
        Some(path) => {
            let specifier = helper.relative_import(from, path);
            out.push_str(&format!("import {name} from {};\n\n", ts_string(&specifier)));
            out.push_str(&format!("export {{ {name} }};\n"));
        }
        None => out.push_str(&format!("export const {name} = {{}};\n")),
    }
    out
}

fn push_type_imports(out: &mut String, names: &BTreeSet<&str>, from: &str, helper: &PathHelper) {
    if names.is_empty() {
        return;
    }
    let specifier = helper.relative_import(from, &helper.output_path(OPERATIONS_TYPES_PATH));
    out.push_str("\nimport type {\n");
    for name in names {
        out.push_str(&format!("  {name},\n"));
    }
    out.push_str(&format!("}} from {};\n", ts_string(&specifier)));
}

fn module(blocks: &[&str]) -> String {
    let mut out = String::from(HEADER);
    let mut empty = true;
    for block in blocks.iter().filter(|block| !block.is_empty()) {
        out.push('\n');
        out.push_str(block);
        empty = false;
    }
    if empty {
        out.push_str("\nexport {};\n");
    }
    out
}

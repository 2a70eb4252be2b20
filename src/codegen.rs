//! build orchestration
//!
//! one pass: load schema, collect documents, analyze, generate, emit. every
//! error aborts the pass before the emitter writes anything.

use crate::analyzer::analyze;
use crate::config::ModuleConfig;
use crate::emitter::{EmitReport, Emitter};
use crate::error::Result;
use crate::generator::{generate_types, GeneratorOptions, GeneratorOutput};
use crate::loader::{collect_documents, load_schema, persist_schema, RawDocument};
use crate::schema::Schema;
use crate::templates::{PathHelper, TEMPLATES};
use std::path::Path;
use tracing::{info, warn};

/// analyze documents against a schema and generate their types
///
/// `root` makes absolute document paths relative in the output.
pub fn generate(
    schema: &Schema,
    documents: &[RawDocument],
    options: &GeneratorOptions,
    root: Option<&Path>,
) -> Result<GeneratorOutput> {
    let analyzed = analyze(schema, documents, root)?;
    Ok(generate_types(schema, analyzed, options))
}

/// summary of a build pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub operations: usize,
    pub emitted: EmitReport,
}

/// run a full build pass
pub fn build(config: &ModuleConfig) -> Result<BuildReport> {
    config.validate()?;
    let helper = PathHelper::new(config);
    let emitter = Emitter::new(TEMPLATES);

    let sdl = match load_schema(&config.schema_source()) {
        Ok(sdl) => sdl,
        Err(err) => {
            warn!("schema unavailable, writing placeholders: {err}");
            emitter.emit_placeholders(&helper)?;
            return Err(err);
        }
    };
    if config.downloads_schema() && persist_schema(config.schema_path(), &sdl)? {
        info!("updated schema at {}", config.schema_path().display());
    }

    let schema = match Schema::parse(&sdl) {
        Ok(schema) => schema,
        Err(err) => {
            warn!("schema invalid, writing placeholders: {err}");
            emitter.emit_placeholders(&helper)?;
            return Err(err);
        }
    };
    let mut documents = collect_documents(
        config.root_dir(),
        &config.documents,
        &config.inline_documents,
    )?;
    // the schema itself matches the default globs
    documents.retain(|doc| config.root_dir().join(&doc.path) != config.schema_path());
    let output = generate(
        &schema,
        &documents,
        config.generator_options(),
        Some(config.root_dir()),
    )?;

    let emitted = emitter.emit(&output, &helper)?;
    info!(
        "generated {} operations: {} files written, {} unchanged",
        output.operations().len(),
        emitted.written.len(),
        emitted.unchanged.len()
    );
    Ok(BuildReport {
        operations: output.operations().len(),
        emitted,
    })
}

//! template emitter
//!
//! renders every template into memory first and only then writes files, so
//! a failing template leaves the previous output untouched.

use crate::error::Result;
use crate::generator::GeneratorOutput;
use crate::templates::{PathHelper, Template};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// a rendered template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// files touched by an emit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// writes a set of templates
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'t> {
    templates: &'t [Template],
}

impl<'t> Emitter<'t> {
    pub fn new(templates: &'t [Template]) -> Self {
        Self { templates }
    }

    /// render every template exactly once
    pub fn render(&self, output: &GeneratorOutput, helper: &PathHelper) -> Result<Vec<RenderedFile>> {
        self.templates
            .iter()
            .map(|template| {
                Ok(RenderedFile {
                    path: helper.output_path(template.output_path),
                    contents: template.render(output, helper)?,
                })
            })
            .collect()
    }

    /// render and write all templates, skipping files whose content is unchanged
    pub fn emit(&self, output: &GeneratorOutput, helper: &PathHelper) -> Result<EmitReport> {
        let files = self.render(output, helper)?;
        let mut report = EmitReport::default();
        for file in files {
            if fs::read_to_string(&file.path).ok().as_deref() == Some(file.contents.as_str()) {
                report.unchanged.push(file.path);
                continue;
            }
            write_file(&file)?;
            report.written.push(file.path);
        }
        Ok(report)
    }

    /// write degenerate output for files that do not exist yet
    ///
    /// keeps imports of the build dir resolvable while no schema is available.
    pub fn emit_placeholders(&self, helper: &PathHelper) -> Result<EmitReport> {
        let files = self.render(&GeneratorOutput::empty(), helper)?;
        let mut report = EmitReport::default();
        for file in files {
            if file.path.exists() {
                report.unchanged.push(file.path);
                continue;
            }
            write_file(&file)?;
            report.written.push(file.path);
        }
        Ok(report)
    }
}

fn write_file(file: &RenderedFile) -> Result<()> {
    if let Some(parent) = file.path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file.path, &file.contents)?;
    debug!("wrote {}", file.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::error::Error;
    use crate::templates::TEMPLATES;
    use tempfile::tempdir;

    fn helper(root: &std::path::Path) -> PathHelper {
        PathHelper::new(&ModuleConfig::new("https://api.example.com/graphql", root))
    }

    fn broken(_output: &GeneratorOutput, _helper: &PathHelper) -> Result<String> {
        Err(Error::Config("broken template".to_string()))
    }

    fn fixed(_helper: &PathHelper) -> Result<String> {
        Ok("fixed\n".to_string())
    }

    #[test]
    fn test_emit_writes_then_skips_unchanged() {
        let dir = tempdir().unwrap();
        let helper = helper(dir.path());
        let emitter = Emitter::new(TEMPLATES);

        let report = emitter.emit(&GeneratorOutput::empty(), &helper).unwrap();
        assert_eq!(report.written.len(), TEMPLATES.len());
        assert!(helper.output_path("graphql-middleware/helpers.js").exists());

        let report = emitter.emit(&GeneratorOutput::empty(), &helper).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.unchanged.len(), TEMPLATES.len());
    }

    #[test]
    fn test_failing_template_writes_nothing() {
        let dir = tempdir().unwrap();
        let helper = helper(dir.path());
        let templates = [
            Template {
                output_path: "a.txt",
                static_source: Some(fixed),
                generated_source: None,
            },
            Template {
                output_path: "b.txt",
                static_source: None,
                generated_source: Some(broken),
            },
        ];

        let err = Emitter::new(&templates)
            .emit(&GeneratorOutput::empty(), &helper)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!helper.output_path("a.txt").exists());
    }

    #[test]
    fn test_placeholders_keep_existing_files() {
        let dir = tempdir().unwrap();
        let helper = helper(dir.path());
        let existing = helper.output_path("graphql-operations/index.js");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, "export const previous = 1;\n").unwrap();

        let report = Emitter::new(TEMPLATES).emit_placeholders(&helper).unwrap();
        assert_eq!(report.unchanged, vec![existing.clone()]);
        assert_eq!(report.written.len(), TEMPLATES.len() - 1);
        assert_eq!(
            fs::read_to_string(existing).unwrap(),
            "export const previous = 1;\n"
        );
    }
}

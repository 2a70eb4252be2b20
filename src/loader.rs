//! schema and document loading
//!
//! reads the schema sdl from disk or over http, and collects operation
//! documents from glob patterns plus inline strings.

use crate::error::{Error, Result};
use regex::Regex;
use reqwest::blocking::Client as BlockingClient;
use reqwest::header::HeaderMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// a graphql document and the path it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub path: String,
    pub source: String,
}

/// where the schema sdl comes from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    File(PathBuf),
    Url { url: String, headers: HeaderMap },
}

/// load the schema sdl text
pub fn load_schema(source: &SchemaSource) -> Result<String> {
    match source {
        SchemaSource::File(path) => {
            debug!("reading schema from {}", path.display());
            fs::read_to_string(path).map_err(|err| {
                Error::Config(format!("failed to read schema {}: {err}", path.display()))
            })
        }
        SchemaSource::Url { url, headers } => {
            info!("downloading schema from {url}");
            let response = BlockingClient::new()
                .get(url)
                .headers(headers.clone())
                .send()?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Config(format!(
                    "schema download from {url} failed: http {status}"
                )));
            }
            Ok(response.text()?)
        }
    }
}

/// write the schema to its output location, skipping identical content
pub fn persist_schema(path: &Path, sdl: &str) -> Result<bool> {
    if fs::read_to_string(path).ok().as_deref() == Some(sdl) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, sdl)?;
    debug!("wrote schema to {}", path.display());
    Ok(true)
}

/// collect documents under `root` matching any of `patterns`, followed by
/// the inline documents. file matches are sorted by path.
pub fn collect_documents(
    root: &Path,
    patterns: &[String],
    inline: &[String],
) -> Result<Vec<RawDocument>> {
    let matchers = patterns
        .iter()
        .map(|pattern| glob_to_regex(pattern))
        .collect::<Result<Vec<_>>>()?;

    let mut documents = Vec::new();
    if !matchers.is_empty() {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry));
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if matchers.iter().any(|re| re.is_match(&relative)) {
                debug!("found document {relative}");
                let source = fs::read_to_string(entry.path())?;
                documents.push(RawDocument {
                    path: relative,
                    source,
                });
            }
        }
        documents.sort_by(|a, b| a.path.cmp(&b.path));
    }

    for (idx, source) in inline.iter().enumerate() {
        documents.push(RawDocument {
            path: format!("<inline-{}>", idx + 1),
            source: source.clone(),
        });
    }

    info!("collected {} graphql documents", documents.len());
    Ok(documents)
}

fn is_ignored(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "node_modules" || name == "target"
}

/// translate a glob (`*`, `**`, `?`, `{a,b}`) into an anchored regex
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let pattern = pattern.trim_start_matches("./");
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut in_group = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
        i += 1;
    }
    if in_group {
        return Err(Error::Config(format!("unclosed brace in glob: {pattern}")));
    }
    out.push('$');
    Regex::new(&out).map_err(|err| Error::Config(format!("invalid glob {pattern}: {err}")))
}

//! run one build pass for a project
//!
//! validates the project's graphql documents against the schema and writes
//! the generated typescript modules and runtime tables to the build dir.
//!
//! command help reference (kept in sync with `graphql-middleware-codegen --help`):
#[doc = concat!("```text\n", include_str!("graphql-middleware-codegen-help.txt"), "\n```")]
pub const CLI_HELP: &str = include_str!("graphql-middleware-codegen-help.txt");

use graphql_middleware::{codegen, ModuleConfig};
use reqwest::header::{HeaderName, HeaderValue};
use std::path::PathBuf;

const DEFAULT_LOG_LEVEL: tracing::Level = tracing::Level::INFO;

#[derive(Debug, Default, PartialEq)]
struct Args {
    endpoint: String,
    root: PathBuf,
    out_dir: Option<PathBuf>,
    prefix: Option<String>,
    schema_path: Option<PathBuf>,
    schema_url: Option<String>,
    headers: Vec<(String, String)>,
    documents: Vec<String>,
    scalars: Vec<(String, String)>,
    client_options: Option<PathBuf>,
    server_options: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq)]
enum ParseArgsError {
    Help,
    Message(String),
}

fn main() {
    let args = match parse_args(std::env::args().collect()) {
        Ok(args) => args,
        Err(ParseArgsError::Help) => {
            print!("{CLI_HELP}");
            return;
        }
        Err(ParseArgsError::Message(err)) => {
            eprintln!("{err}\n\n{CLI_HELP}");
            std::process::exit(1);
        }
    };

    setup_logger(args.verbose);

    let config = match module_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid arguments: {err}");
            std::process::exit(1);
        }
    };

    match codegen::build(&config) {
        Ok(report) => {
            let mut out = String::new();
            out.push_str(&format!("generated {} operations\n", report.operations));
            for path in &report.emitted.written {
                out.push_str(&format!("  wrote {}\n", path.display()));
            }
            if !report.emitted.unchanged.is_empty() {
                out.push_str(&format!(
                    "  {} files unchanged\n",
                    report.emitted.unchanged.len()
                ));
            }
            print!("{out}");
        }
        Err(err) => {
            eprintln!("codegen failed: {err}");
            std::process::exit(1);
        }
    }
}

fn setup_logger(verbose: bool) {
    let mut log_level_warnings: Vec<String> = vec![];
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        let env_val = std::env::var("LOG_LEVEL").map(|s| s.trim().to_string());
        match env_val.as_deref() {
            Ok("TRACE" | "trace") => tracing::Level::TRACE,
            Ok("DEBUG" | "debug") => tracing::Level::DEBUG,
            Ok("INFO" | "info") => tracing::Level::INFO,
            Ok("WARN" | "warn") => tracing::Level::WARN,
            Ok("ERROR" | "error") => tracing::Level::ERROR,
            Ok(other) => {
                log_level_warnings.push(format!(
                    "invalid `LOG_LEVEL` environment variable value: `{other}`"
                ));
                DEFAULT_LOG_LEVEL
            }
            Err(_) => DEFAULT_LOG_LEVEL,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    for warning in log_level_warnings.drain(..) {
        tracing::warn!("{warning}");
    }
}

fn parse_args(args: Vec<String>) -> Result<Args, ParseArgsError> {
    let mut parsed = Args {
        root: PathBuf::from("."),
        ..Args::default()
    };
    let mut endpoint = None;

    let mut iter = args.into_iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--endpoint" => endpoint = Some(value(&mut iter, &arg)?),
            "--root" => parsed.root = PathBuf::from(value(&mut iter, &arg)?),
            "--out" => parsed.out_dir = Some(PathBuf::from(value(&mut iter, &arg)?)),
            "--prefix" => parsed.prefix = Some(value(&mut iter, &arg)?),
            "--schema" => parsed.schema_path = Some(PathBuf::from(value(&mut iter, &arg)?)),
            "--schema-url" => parsed.schema_url = Some(value(&mut iter, &arg)?),
            "--header" => {
                let raw = value(&mut iter, &arg)?;
                parsed.headers.push(split_pair(&raw, ':', &arg)?);
            }
            "--documents" => parsed.documents.push(value(&mut iter, &arg)?),
            "--scalar" => {
                let raw = value(&mut iter, &arg)?;
                parsed.scalars.push(split_pair(&raw, '=', &arg)?);
            }
            "--client-options" => {
                parsed.client_options = Some(PathBuf::from(value(&mut iter, &arg)?))
            }
            "--server-options" => {
                parsed.server_options = Some(PathBuf::from(value(&mut iter, &arg)?))
            }
            "--verbose" | "-v" => parsed.verbose = true,
            "--help" | "-h" => return Err(ParseArgsError::Help),
            _ => return Err(ParseArgsError::Message(format!("unknown argument: {arg}"))),
        }
    }

    parsed.endpoint =
        endpoint.ok_or_else(|| ParseArgsError::Message("--endpoint is required".to_string()))?;
    Ok(parsed)
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, ParseArgsError> {
    iter.next()
        .ok_or_else(|| ParseArgsError::Message(format!("{flag} requires a value")))
}

fn split_pair(raw: &str, separator: char, flag: &str) -> Result<(String, String), ParseArgsError> {
    match raw.split_once(separator) {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ParseArgsError::Message(format!(
            "{flag} expects <name>{separator}<value>, got: {raw}"
        ))),
    }
}

fn module_config(args: &Args) -> Result<ModuleConfig, String> {
    let mut config = ModuleConfig::new(&args.endpoint, &args.root);
    if let Some(out_dir) = &args.out_dir {
        config = config.with_build_dir(out_dir);
    }
    if let Some(prefix) = &args.prefix {
        config = config.with_server_api_prefix(prefix);
    }
    if let Some(schema_path) = &args.schema_path {
        config = config.with_schema_path(schema_path);
    }
    if let Some(schema_url) = &args.schema_url {
        config = config.with_schema_url(schema_url);
    }
    for (name, value) in &args.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| format!("invalid header name {name}: {err}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| format!("invalid header value for {name}: {err}"))?;
        config = config.with_schema_header(name, value);
    }
    if !args.documents.is_empty() {
        config = config.with_documents(args.documents.iter().cloned());
    }
    for (scalar, ts_type) in &args.scalars {
        config = config.with_scalar(scalar, ts_type);
    }
    if let Some(path) = &args.client_options {
        config = config.with_client_options_path(path);
    }
    if let Some(path) = &args.server_options {
        config = config.with_server_options_path(path);
    }
    Ok(config)
}

//! rf - format descriptor compiler
//!
//! CLI entry point for checking format configurations and decoding messages
//! with them.

use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info, warn};

use rowformat::cli::{Cli, Command};
use rowformat::config::Config;
use rowformat::{DescriptorCompiler, RowDeserializer, RowSchema, normalize_key};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (WARN)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to WARN", s);
                tracing::Level::WARN
            }
        },
        None => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn load_schema(path: &Path) -> Result<Arc<RowSchema>> {
    let schema: RowSchema = rowformat::ConfigBinder::new()
        .bind_file(path)
        .context(format!("Failed to load row schema {}", path.display()))?;
    if schema.is_empty() {
        warn!(path = %path.display(), "Row schema has no fields");
    }
    Ok(Arc::new(schema))
}

fn compiler(config: &Config, registry: &[PathBuf]) -> Result<DescriptorCompiler> {
    let registry = config.load_registry(registry)?;
    info!(types = registry.len(), "Type registry ready");
    Ok(DescriptorCompiler::new(registry))
}

fn cmd_normalize(keys: &[String]) -> Result<()> {
    for key in keys {
        println!("{}", normalize_key(key));
    }
    Ok(())
}

fn cmd_check(config: &Config, files: &[PathBuf], schema: &Path, registry: &[PathBuf]) -> Result<()> {
    let schema = load_schema(schema)?;
    let compiler = compiler(config, registry)?;
    let report = compiler.seed_files(files, schema);

    for (name, deserializer) in &report.compiled {
        println!("{} {} ({})", "✓".green(), name, deserializer.format().to_string().cyan());
    }
    for (name, error) in &report.failed {
        println!("{} {}: {}", "✗".red(), name, error);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!("{} of {} configurations failed", report.failed.len(), files.len()))
    }
}

fn cmd_decode(
    config: &Config,
    format: &Path,
    schema: &Path,
    registry: &[PathBuf],
    binary: bool,
    input: Option<&Path>,
) -> Result<()> {
    let schema = load_schema(schema)?;
    let compiler = compiler(config, registry)?;
    let deserializer = compiler
        .compile_file(format, Arc::clone(&schema))
        .context(format!("Failed to compile format {}", format.display()))?;

    let reader: Box<dyn Read> = match input {
        Some(path) => Box::new(fs::File::open(path).context(format!("Failed to open {}", path.display()))?),
        None => Box::new(io::stdin()),
    };

    if binary {
        let mut message = Vec::new();
        BufReader::new(reader)
            .read_to_end(&mut message)
            .context("Failed to read input")?;
        let row = deserializer.deserialize(&message).context("Failed to decode message")?;
        println!("{}", row.to_json(&schema));
        return Ok(());
    }

    let mut decoded = 0usize;
    let mut skipped = 0usize;
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        match deserializer.deserialize(line.as_bytes()) {
            Ok(row) => {
                println!("{}", row.to_json(&schema));
                decoded += 1;
            }
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "Skipping undecodable message");
                skipped += 1;
            }
        }
    }
    info!(decoded, skipped, "Decode finished");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > WARN default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Normalize { keys } => cmd_normalize(&keys),
        Command::Check {
            files,
            schema,
            registry,
        } => cmd_check(&config, &files, &schema, &registry),
        Command::Decode {
            format,
            schema,
            registry,
            binary,
            input,
        } => cmd_decode(&config, &format, &schema, &registry, binary, input.as_deref()),
    }
}

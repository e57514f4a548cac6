//! CLI argument parsing for rf

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rf")]
#[command(author, version, about = "Compile format descriptors into row deserializers", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the canonical spelling of configuration keys
    Normalize {
        /// Raw keys
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Compile format descriptor files and report which ones fail
    Check {
        /// Format descriptor files (YAML or JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Row schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Additional type registry files
        #[arg(short, long)]
        registry: Vec<PathBuf>,
    },

    /// Decode messages with a compiled format and print rows as JSON lines
    Decode {
        /// Format descriptor file
        #[arg(short, long)]
        format: PathBuf,

        /// Row schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Additional type registry files
        #[arg(short, long)]
        registry: Vec<PathBuf>,

        /// Treat the whole input as one message instead of one per line
        #[arg(short, long)]
        binary: bool,

        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },
}

//! The command line parser.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tabstore")]
#[command(about = "Inspect, convert and export typed CSV tables", long_about = None)]
pub struct CliParser {
    #[command(subcommand)]
    pub command: CliCommand,

    // Split every file on this character instead of guessing from its encoding.
    #[arg(long, global = true)]
    pub separator: Option<char>,

    // Encoding label for files that are neither UTF-8 nor UTF-16 (like 'gbk').
    #[arg(long, global = true)]
    pub fallback_encoding: Option<String>,
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Print the schema and the rows of a CSV table.
    Inspect {
        file: PathBuf,

        // Print the rows as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Print a CSV table as JSON.
    Json {
        file: PathBuf,

        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        // Keep the key column whatever the field selection says.
        #[arg(long)]
        keep_key: bool,
    },

    /// Re-encode a CSV table, UTF-8 with commas or UTF-16 with tabs.
    Convert {
        file: PathBuf,
        out: PathBuf,

        #[arg(long)]
        utf16: bool,

        // Keep blank and unparsable lines.
        #[arg(long)]
        keep_dummy_rows: bool,
    },

    /// Export every configured table of a directory tree as JSON.
    Export {
        dir: PathBuf,
        out: PathBuf,

        #[arg(long, default_value = "config")]
        tag: String,
    },

    /// Write a table of a directory tree back to its file, keeping a backup.
    WriteBack {
        dir: PathBuf,
        name: String,

        // Write below this directory instead, leaving the original alone.
        #[arg(long)]
        to: Option<PathBuf>,
    },
}

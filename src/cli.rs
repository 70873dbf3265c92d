use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Replace a database table's contents from a CSV or spreadsheet file",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete every row in the configured table and load the source file into it
    Import(ImportArgs),
    /// Check that the source file has data rows beyond its header
    Check(SourceArgs),
    /// Show the first normalized rows without touching the database
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    /// Source file path or http(s) URL
    #[arg(short, long)]
    pub source: String,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Run the load against an in-memory table and report what would change
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Treat this column as a date column (repeatable)
    #[arg(long = "date-column", action = clap::ArgAction::Append)]
    pub date_columns: Vec<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub mod cli;
pub mod config;
pub mod data;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod importer;
pub mod io_utils;
pub mod plan;
pub mod rows;
pub mod sink;
pub mod source;
pub mod table;
pub mod transform;

use std::{collections::BTreeSet, env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands},
    config::ImporterConfig,
    importer::Importer,
    sink::{MemorySink, SqliteSink},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("single_table_importer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Check(args) => handle_check(&args),
        Commands::Preview(args) => handle_preview(&args),
    }
}

fn prepare(args: &cli::SourceArgs) -> Result<Importer> {
    let config = ImporterConfig::load(&args.config)
        .with_context(|| format!("Loading configuration from {:?}", args.config))?;
    debug!(
        "Destination table '{}' in {:?}; required columns {:?}",
        config.table, config.database, config.required_columns
    );
    let source = fetch::resolve_source(&args.source, &config)?;
    info!("Using source file {:?}", source);
    Ok(Importer::new(config, source))
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let importer = prepare(&args.source)?;
    let rows = importer.test_run()?;
    if args.dry_run {
        let date_columns = existing_date_columns(&importer);
        let mut sink = MemorySink::new();
        let report = importer.run(&mut sink, &date_columns)?;
        info!(
            "Dry run: would delete all rows from '{}' and insert {} of {} row(s)",
            importer.config().table,
            report.inserted,
            rows
        );
        return Ok(());
    }
    let report = importer.run_sqlite()?;
    debug!(
        "Replacement load finished: {} deleted, {} inserted",
        report.deleted, report.inserted
    );
    Ok(())
}

fn handle_check(args: &cli::SourceArgs) -> Result<()> {
    let importer = prepare(args)?;
    let rows = importer.test_run()?;
    info!("✓ {:?} has {} data row(s)", importer.source(), rows);
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let importer = prepare(&args.source)?;
    let mut date_columns = existing_date_columns(&importer);
    date_columns.extend(
        args.date_columns
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string()),
    );
    let rows = importer
        .normalized_rows(&date_columns)?
        .take(args.rows)
        .collect::<error::Result<Vec<_>>>()?;
    print!("{}", table::render_rows(&rows));
    info!("Displayed {} row(s) from {:?}", rows.len(), importer.source());
    Ok(())
}

/// Date columns of the destination table when its database is reachable.
fn existing_date_columns(importer: &Importer) -> BTreeSet<String> {
    let database = &importer.config().database;
    if !database.is_file() {
        debug!("Database {database:?} not found; no date columns discovered");
        return BTreeSet::new();
    }
    match SqliteSink::open_read_only(database) {
        Ok(sink) => importer.date_columns(&sink).unwrap_or_else(|err| {
            warn!("Could not read date columns: {err}");
            BTreeSet::new()
        }),
        Err(err) => {
            warn!("Could not open {database:?}: {err}");
            BTreeSet::new()
        }
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

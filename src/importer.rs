//! Pipeline driver: read, shape, alter, normalize dates, assemble, load.
//!
//! [`RowPipeline`] holds everything a row transformation needs and is built
//! once per run. [`Importer`] ties a configuration and a source file together
//! and runs the replacement load against a sink.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    config::ImporterConfig,
    data::{Cell, NormalizedRow, RawRow},
    dates::{DateNormalizer, format_canonical},
    error::{ImportError, Result, file_label},
    io_utils,
    plan::{LoadReport, execute_plan},
    rows::{assemble_row, fix_row_shape},
    sink::{PersistenceSink, SchemaIntrospector, SqliteSink},
    source::{SourceFormat, TabularSource},
    transform::alterations::TextAlterations,
};

#[derive(Debug, Clone)]
pub struct RowPipeline {
    headers: Vec<String>,
    alterations: TextAlterations,
    dates: DateNormalizer,
    date_positions: Vec<usize>,
}

impl RowPipeline {
    pub fn new(
        headers: Vec<String>,
        alterations: TextAlterations,
        dates: DateNormalizer,
        date_columns: &BTreeSet<String>,
    ) -> Self {
        let date_positions = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| date_columns.contains(header.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        Self {
            headers,
            alterations,
            dates,
            date_positions,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// `row_number` is only used for diagnostics (header is row 1).
    pub fn normalize(&self, row_number: usize, raw: RawRow) -> NormalizedRow {
        let shaped = fix_row_shape(self.headers.len(), raw);
        let mut altered = self.alterations.apply(&self.headers, shaped);
        for &idx in &self.date_positions {
            let column = &self.headers[idx];
            let original = &altered[idx];
            if original.is_empty() {
                continue;
            }
            match self.dates.interpret(original, column) {
                Some(parsed) => altered[idx] = Cell::Text(format_canonical(&parsed)),
                None => debug!(
                    "Row {row_number} column '{column}': could not interpret '{original}' as a date"
                ),
            }
        }
        assemble_row(&self.headers, altered)
    }
}

#[derive(Debug, Clone)]
pub struct Importer {
    config: ImporterConfig,
    source: PathBuf,
}

impl Importer {
    pub fn new(config: ImporterConfig, source: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source: source.into(),
        }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn open_source(&self) -> Result<TabularSource> {
        let delimiter = self
            .config
            .delimiter_byte()
            .map_err(|err| ImportError::Config(format!("{err:#}")))?;
        let encoding = io_utils::resolve_encoding(self.config.input_encoding.as_deref())
            .map_err(|err| ImportError::Config(format!("{err:#}")))?;
        let format = SourceFormat::detect(&self.source, delimiter);
        TabularSource::open(&self.source, format, encoding)
    }

    /// Pre-flight check: fails unless the source has at least one data row.
    /// Returns the number of data rows.
    pub fn test_run(&self) -> Result<usize> {
        let (headers, rows) = self.open_source()?.into_parts();
        let mut count = 0usize;
        for row in rows {
            row?;
            count += 1;
        }
        if headers.is_empty() || count == 0 {
            return Err(ImportError::InsufficientData {
                file: file_label(&self.source),
            });
        }
        Ok(count)
    }

    pub fn pipeline(&self, headers: Vec<String>, date_columns: &BTreeSet<String>) -> Result<RowPipeline> {
        let alterations = self
            .config
            .alterations()
            .map_err(|err| ImportError::Config(format!("{err:#}")))?;
        Ok(RowPipeline::new(
            headers,
            alterations,
            self.config.date_normalizer(),
            date_columns,
        ))
    }

    /// Lazily normalizes every data row of the source.
    pub fn normalized_rows(
        &self,
        date_columns: &BTreeSet<String>,
    ) -> Result<impl Iterator<Item = Result<NormalizedRow>> + use<>> {
        let (headers, rows) = self.open_source()?.into_parts();
        let pipeline = self.pipeline(headers, date_columns)?;
        Ok(rows
            .enumerate()
            .map(move |(idx, row)| row.map(|raw| pipeline.normalize(idx + 2, raw))))
    }

    /// Deletes everything in the destination table and inserts the
    /// normalized source rows.
    pub fn run<S>(&self, sink: &mut S, date_columns: &BTreeSet<String>) -> Result<LoadReport>
    where
        S: PersistenceSink + ?Sized,
    {
        let rows = self.normalized_rows(date_columns)?;
        let planner = self.config.planner();
        execute_plan(sink, planner.plan(rows), &self.source, self.config.transaction)
    }

    /// Runs against the configured SQLite database, discovering date columns
    /// from the destination table.
    pub fn run_sqlite(&self) -> Result<LoadReport> {
        let mut sink =
            SqliteSink::open(&self.config.database).map_err(|err| ImportError::load(&self.source, err))?;
        let date_columns = self.date_columns(&sink)?;
        self.run(&mut sink, &date_columns)
    }

    pub fn date_columns(&self, introspector: &dyn SchemaIntrospector) -> Result<BTreeSet<String>> {
        let columns = introspector
            .date_columns(&self.config.table)
            .map_err(|err| ImportError::load(&self.source, err))?;
        info!(
            "Table '{}' has {} date column(s)",
            self.config.table,
            columns.len()
        );
        Ok(columns)
    }
}

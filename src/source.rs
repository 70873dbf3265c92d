//! Tabular source reading.
//!
//! A source is either delimited text or a spreadsheet workbook, chosen from
//! the file extension. Opening a source yields its header row and a
//! single-pass iterator over the remaining rows. Only the first worksheet of
//! a workbook is read.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::SubsecRound;
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{Cell, RawRow},
    dates::format_canonical,
    error::{ImportError, Result},
    io_utils,
};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited { delimiter: u8 },
    Spreadsheet,
}

impl SourceFormat {
    /// Picks the format from the extension; anything that is not a known
    /// workbook extension is read as delimited text.
    pub fn detect(path: &Path, delimiter: Option<u8>) -> Self {
        let is_spreadsheet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SPREADSHEET_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_spreadsheet {
            SourceFormat::Spreadsheet
        } else {
            SourceFormat::Delimited {
                delimiter: io_utils::resolve_input_delimiter(path, delimiter),
            }
        }
    }
}

pub struct TabularSource {
    headers: Vec<String>,
    rows: SourceRows,
}

impl TabularSource {
    pub fn open(path: &Path, format: SourceFormat, encoding: &'static Encoding) -> Result<Self> {
        match format {
            SourceFormat::Delimited { delimiter } => open_delimited(path, delimiter, encoding),
            SourceFormat::Spreadsheet => open_spreadsheet(path),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn into_parts(self) -> (Vec<String>, SourceRows) {
        (self.headers, self.rows)
    }
}

/// Forward-only iterator over the data rows of a source.
pub struct SourceRows {
    path: PathBuf,
    inner: RowsInner,
}

enum RowsInner {
    Delimited {
        records: csv::ByteRecordsIntoIter<BufReader<File>>,
        encoding: &'static Encoding,
        line: usize,
    },
    Spreadsheet {
        range: Range<Data>,
        next_row: usize,
    },
}

impl Iterator for SourceRows {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowsInner::Delimited {
                records,
                encoding,
                line,
            } => {
                let record = records.next()?;
                *line += 1;
                let line = *line;
                let encoding = *encoding;
                let row = record
                    .map_err(|err| {
                        ImportError::source_format(&self.path, format!("row {line}: {err}"))
                    })
                    .and_then(|record| {
                        io_utils::decode_record(&record, encoding).map_err(|err| {
                            ImportError::source_format(&self.path, format!("row {line}: {err}"))
                        })
                    })
                    .map(|fields| fields.into_iter().map(Cell::text).collect());
                Some(row)
            }
            RowsInner::Spreadsheet { range, next_row } => {
                if *next_row >= range.height() {
                    return None;
                }
                let row = sheet_row(range, *next_row);
                *next_row += 1;
                Some(Ok(row))
            }
        }
    }
}

fn open_delimited(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<TabularSource> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)
        .map_err(|err| ImportError::source_format(path, format!("{err:#}")))?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|err| ImportError::source_format(path, format!("{err:#}")))?;
    debug!(
        "Read {} header column(s) from {:?} (delimiter '{}')",
        headers.len(),
        path,
        crate::printable_delimiter(delimiter)
    );
    Ok(TabularSource {
        headers,
        rows: SourceRows {
            path: path.to_path_buf(),
            inner: RowsInner::Delimited {
                records: reader.into_byte_records(),
                encoding,
                line: 1,
            },
        },
    })
}

fn open_spreadsheet(path: &Path) -> Result<TabularSource> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| ImportError::source_format(path, err))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let Some(first) = sheet_names.first() else {
        return Err(ImportError::source_format(path, "workbook has no sheets"));
    };
    debug!(
        "Reading worksheet '{}' (first of {}) from {:?}",
        first,
        sheet_names.len(),
        path
    );
    let range = workbook
        .worksheet_range(first)
        .map_err(|err| ImportError::source_format(path, err))?;

    let headers = if range.height() > 0 {
        sheet_row(&range, 0).into_iter().map(Cell::into_string).collect()
    } else {
        Vec::new()
    };

    Ok(TabularSource {
        headers,
        rows: SourceRows {
            path: path.to_path_buf(),
            inner: RowsInner::Spreadsheet { range, next_row: 1 },
        },
    })
}

fn sheet_row(range: &Range<Data>, row: usize) -> RawRow {
    (0..range.width())
        .map(|col| range.get((row, col)).map_or(Cell::Empty, data_to_cell))
        .collect()
}

/// Date cells are converted with the workbook's own epoch (1900 or 1904)
/// into canonical text. A date cell calamine cannot convert keeps its serial
/// number for the date normalizer.
pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => Cell::Text(format_canonical(&parsed.round_subsecs(0))),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Error(err) => Cell::Text(err.to_string()),
    }
}

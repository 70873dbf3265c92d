//! Destination store adapters.
//!
//! [`PersistenceSink`] is the boundary the load step talks to: delete every
//! row of a table, insert one row at a time, and optionally bracket the run in
//! a transaction. [`SqliteSink`] writes to a SQLite database and also answers
//! which columns are date-typed. [`MemorySink`] keeps rows in memory for dry
//! runs.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use log::debug;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::error::SinkError;

pub type SinkResult<T> = std::result::Result<T, SinkError>;

pub trait PersistenceSink {
    fn begin(&mut self) -> SinkResult<()> {
        Ok(())
    }

    /// Returns the number of rows removed.
    fn delete_all(&mut self, table: &str) -> SinkResult<usize>;

    /// Returns the number of rows affected.
    fn insert(&mut self, table: &str, values: &[(String, String)]) -> SinkResult<usize>;

    fn commit(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

pub trait SchemaIntrospector {
    /// Names of the columns in `table` that hold timestamps.
    fn date_columns(&self, table: &str) -> SinkResult<BTreeSet<String>>;
}

const DATE_TYPES: &[&str] = &["DATETIME", "TIMESTAMP", "DATE"];

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens an existing database; a missing file is an error, not created.
    pub fn open(path: &Path) -> SinkResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    pub fn open_read_only(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl PersistenceSink for SqliteSink {
    fn begin(&mut self) -> SinkResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn delete_all(&mut self, table: &str) -> SinkResult<usize> {
        let sql = format!("DELETE FROM {}", quote_identifier(table));
        Ok(self.conn.execute(&sql, [])?)
    }

    fn insert(&mut self, table: &str, values: &[(String, String)]) -> SinkResult<usize> {
        let sql = insert_statement(table, values);
        let mut statement = self.conn.prepare_cached(&sql)?;
        let affected = statement.execute(params_from_iter(values.iter().map(|(_, v)| v)))?;
        Ok(affected)
    }

    fn commit(&mut self) -> SinkResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl SchemaIntrospector for SqliteSink {
    fn date_columns(&self, table: &str) -> SinkResult<BTreeSet<String>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut statement = self.conn.prepare(&sql)?;
        let columns = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>("name")?, row.get::<_, String>("type")?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(format!("table '{table}' does not exist").into());
        }
        let dates = columns
            .into_iter()
            .filter(|(_, declared)| is_date_type(declared))
            .map(|(name, _)| name)
            .collect::<BTreeSet<_>>();
        debug!("Table '{table}' has date column(s) {dates:?}");
        Ok(dates)
    }
}

/// Matches `DATETIME`, `TIMESTAMP(6)`, `date` and the like.
pub fn is_date_type(declared: &str) -> bool {
    let base = declared
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    DATE_TYPES
        .iter()
        .any(|candidate| base.eq_ignore_ascii_case(candidate))
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn insert_statement(table: &str, values: &[(String, String)]) -> String {
    if values.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
    }
    let columns = values
        .iter()
        .map(|(column, _)| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

/// Holds table contents in memory. Transactions snapshot and restore state.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, Vec<Vec<(String, String)>>>,
    snapshot: Option<BTreeMap<String, Vec<Vec<(String, String)>>>>,
    fail_on_insert: Option<usize>,
    inserts_seen: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(table: &str, rows: Vec<Vec<(String, String)>>) -> Self {
        let mut sink = Self::new();
        sink.tables.insert(table.to_string(), rows);
        sink
    }

    /// Makes the `n`th insert (1-based) fail.
    pub fn failing_on_insert(mut self, n: usize) -> Self {
        self.fail_on_insert = Some(n);
        self
    }

    pub fn rows(&self, table: &str) -> &[Vec<(String, String)>] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PersistenceSink for MemorySink {
    fn begin(&mut self) -> SinkResult<()> {
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn delete_all(&mut self, table: &str) -> SinkResult<usize> {
        Ok(self
            .tables
            .get_mut(table)
            .map(|rows| rows.drain(..).count())
            .unwrap_or(0))
    }

    fn insert(&mut self, table: &str, values: &[(String, String)]) -> SinkResult<usize> {
        self.inserts_seen += 1;
        if self.fail_on_insert == Some(self.inserts_seen) {
            return Err(format!("simulated failure on insert {}", self.inserts_seen).into());
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(values.to_vec());
        Ok(1)
    }

    fn commit(&mut self) -> SinkResult<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
        Ok(())
    }
}

//! Replacement load planning and execution.
//!
//! A load plan is one `DeleteAll` followed by one `Insert` per normalized
//! row. Required columns with an empty value are left out of that row's
//! insert; the row itself is still inserted.

use std::{collections::BTreeSet, iter, path::Path};

use log::{debug, info};

use crate::{
    data::NormalizedRow,
    error::{ImportError, Result},
    sink::PersistenceSink,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOperation {
    DeleteAll {
        table: String,
    },
    Insert {
        table: String,
        values: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub deleted: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone)]
pub struct LoadPlanner {
    table: String,
    required: BTreeSet<String>,
}

impl LoadPlanner {
    pub fn new(table: impl Into<String>, required: impl IntoIterator<Item = String>) -> Self {
        Self {
            table: table.into(),
            required: required.into_iter().collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn delete_operation(&self) -> LoadOperation {
        LoadOperation::DeleteAll {
            table: self.table.clone(),
        }
    }

    pub fn insert_operation(&self, row: NormalizedRow) -> LoadOperation {
        let values = row
            .into_entries()
            .into_iter()
            .filter(|(column, value)| !(value.is_empty() && self.required.contains(column)))
            .collect();
        LoadOperation::Insert {
            table: self.table.clone(),
            values,
        }
    }

    /// Lazily yields the delete followed by one insert per row. Row errors
    /// are carried through so the executor stops at the first one.
    pub fn plan<'a, I>(&'a self, rows: I) -> impl Iterator<Item = Result<LoadOperation>> + 'a
    where
        I: IntoIterator<Item = Result<NormalizedRow>>,
        I::IntoIter: 'a,
    {
        iter::once(Ok(self.delete_operation()))
            .chain(
                rows.into_iter()
                    .map(move |row| row.map(|row| self.insert_operation(row))),
            )
    }
}

/// Runs planned operations against `sink`, stopping at the first failure.
///
/// With `transactional` set the whole run is committed at the end or rolled
/// back on error. Persistence failures are reported against the base name of
/// `source`.
pub fn execute_plan<S, I>(
    sink: &mut S,
    operations: I,
    source: &Path,
    transactional: bool,
) -> Result<LoadReport>
where
    S: PersistenceSink + ?Sized,
    I: IntoIterator<Item = Result<LoadOperation>>,
{
    if transactional {
        sink.begin().map_err(|err| ImportError::load(source, err))?;
    }
    match apply_operations(sink, operations, source) {
        Ok(report) => {
            if transactional {
                sink.commit().map_err(|err| ImportError::load(source, err))?;
            }
            info!("Imported {} rows.", report.inserted);
            Ok(report)
        }
        Err(err) => {
            if transactional && let Err(rollback_err) = sink.rollback() {
                debug!("Rollback after failed load also failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

fn apply_operations<S, I>(sink: &mut S, operations: I, source: &Path) -> Result<LoadReport>
where
    S: PersistenceSink + ?Sized,
    I: IntoIterator<Item = Result<LoadOperation>>,
{
    let mut report = LoadReport::default();
    for operation in operations {
        match operation? {
            LoadOperation::DeleteAll { table } => {
                report.deleted += sink
                    .delete_all(&table)
                    .map_err(|err| ImportError::load(source, err))?;
                info!("Deleted all rows.");
                debug!("Removed {} prior row(s) from '{}'", report.deleted, table);
            }
            LoadOperation::Insert { table, values } => {
                report.inserted += sink
                    .insert(&table, &values)
                    .map_err(|err| ImportError::load(source, err))?;
            }
        }
    }
    Ok(report)
}

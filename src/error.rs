//! Error kinds surfaced by the import pipeline.
//!
//! Every variant is fatal for the run. Date conversion failures are not
//! represented here: the normalizer passes unconvertible values through.

use std::{error::Error as StdError, path::Path};

use thiserror::Error;

/// Boxed error returned by a persistence sink.
pub type SinkError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Source data not found at {location}")]
    SourceNotFound { location: String },
    #[error("Unable to read {file} as tabular data: {reason}")]
    SourceFormat { file: String, reason: String },
    #[error("Aborting import of {file}: insufficient source data")]
    InsufficientData { file: String },
    #[error("Error loading file {file}: {source}")]
    Load {
        file: String,
        #[source]
        source: SinkError,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Base name of `path` used to annotate user-facing messages.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ImportError {
    pub fn source_format(path: &Path, reason: impl ToString) -> Self {
        ImportError::SourceFormat {
            file: file_label(path),
            reason: reason.to_string(),
        }
    }

    pub fn load(path: &Path, source: impl Into<SinkError>) -> Self {
        ImportError::Load {
            file: file_label(path),
            source: source.into(),
        }
    }
}

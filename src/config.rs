//! Run configuration loaded from YAML.
//!
//! ```yaml
//! database: people.sqlite
//! table: people
//! required_columns: [name]
//! text_alterations:
//!   - { from: "N/A", to: "" }
//! text_alterations_per_column:
//!   status:
//!     - { from: "open", to: "pending" }
//! date_formats:
//!   joined: ["%d/%m/%Y"]
//! ```
//!
//! A relative `database` path is resolved against the directory holding the
//! configuration file.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    dates::DateNormalizer,
    plan::LoadPlanner,
    transform::alterations::{TextAlterations, ValueReplacement},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub database: PathBuf,
    pub table: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_alterations: Vec<ValueReplacement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub text_alterations_per_column: BTreeMap<String, Vec<ValueReplacement>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub date_formats: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    #[serde(default = "ImporterConfig::default_transaction")]
    pub transaction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxy_exceptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ImporterConfig {
    fn default_transaction() -> bool {
        true
    }

    pub fn new(database: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            required_columns: Vec::new(),
            text_alterations: Vec::new(),
            text_alterations_per_column: BTreeMap::new(),
            date_formats: BTreeMap::new(),
            delimiter: None,
            input_encoding: None,
            transaction: true,
            proxy: None,
            proxy_exceptions: Vec::new(),
            user_agent: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let mut config: ImporterConfig =
            serde_yaml::from_reader(reader).context("Parsing config YAML")?;
        if config.database.is_relative()
            && let Some(parent) = path.parent()
        {
            config.database = parent.join(&config.database);
        }
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let config: ImporterConfig = serde_yaml::from_str(input).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.table.trim().is_empty(), "'table' must not be empty");
        self.alterations()?;
        for (column, patterns) in &self.date_formats {
            ensure!(
                patterns.iter().all(|pattern| !pattern.is_empty()),
                "Date format list for column '{column}' contains an empty pattern"
            );
        }
        self.delimiter_byte()?;
        crate::io_utils::resolve_encoding(self.input_encoding.as_deref())?;
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        self.delimiter
            .as_deref()
            .map(|value| parse_delimiter(value).map_err(|err| anyhow!("Invalid delimiter: {err}")))
            .transpose()
    }

    pub fn alterations(&self) -> Result<TextAlterations> {
        Ok(TextAlterations::new(
            self.text_alterations.clone(),
            self.text_alterations_per_column.clone(),
        )?)
    }

    pub fn date_normalizer(&self) -> DateNormalizer {
        DateNormalizer::new(self.date_formats.clone())
    }

    pub fn planner(&self) -> LoadPlanner {
        LoadPlanner::new(self.table.clone(), self.required_columns.iter().cloned())
    }
}

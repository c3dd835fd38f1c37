//! Configuration loading and parsing

use anyhow::{Context, Result};
use dbc_table_codec::CodecConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub table: TableConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory for converted files (default: next to the input)
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub format: TableFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Json,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Whether the first CSV row is a header
    #[serde(default = "default_true")]
    pub has_header: bool,
    /// Field delimiter for CSV files
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: default_delimiter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    // Surface mapping mistakes before any file is touched
    config
        .codec
        .column_mapping()
        .with_context(|| format!("Invalid column mapping in {:?}", path))?;

    if !config.table.delimiter.is_ascii() {
        anyhow::bail!(
            "CSV delimiter {:?} in {:?} must be an ASCII character",
            config.table.delimiter,
            path
        );
    }

    Ok(config)
}

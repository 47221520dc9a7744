//! Configuration module for tickcast.
//!
//! Settings are resolved in layers: built-in defaults, an optional TOML file,
//! then environment variables. Command-line flags are applied last by the
//! binary.

mod data_config;
mod model_config;

pub use data_config::DataEnvConfig;
pub use model_config::ModelEnvConfig;

use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::model::ModelKind;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `[data]` table of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataFileSection {
    pub data_dir: Option<PathBuf>,
    pub search_depth: Option<usize>,
    pub candle_interval: Option<Timeframe>,
}

/// `[model]` table of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelFileSection {
    pub model_dir: Option<PathBuf>,
    pub kind: Option<ModelKind>,
    pub lookback: Option<usize>,
    pub n_future: Option<usize>,
    pub train_split: Option<f64>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub hidden_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub forest_trees: Option<usize>,
    pub forest_max_depth: Option<u16>,
    pub forest_min_split: Option<usize>,
}

/// Optional TOML overlay
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub data: Option<DataFileSection>,
    pub model: Option<ModelFileSection>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .context(format!("Failed to parse config TOML: {}", path.display()))
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data: DataEnvConfig,
    pub model: ModelEnvConfig,
}

impl Config {
    /// Load configuration from an optional TOML file, then environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_lookup(&file, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(file: &FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data = DataEnvConfig::from_lookup(file, &lookup).context("Failed to load data config")?;
        let model =
            ModelEnvConfig::from_lookup(file, &lookup).context("Failed to load model config")?;
        Ok(Self { data, model })
    }
}

/// Parses `key` from `lookup`, falling back to `default` when unset.
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .context(format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}

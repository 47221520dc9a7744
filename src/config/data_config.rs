//! Market data configuration parsing from environment variables.
//!
//! This module handles locating the data tree and the candle interval.

use super::{FileConfig, parse_var};
use crate::domain::market::timeframe::Timeframe;
use anyhow::Result;
use std::path::PathBuf;

/// Market data environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DataEnvConfig {
    /// Explicit data root; discovered by walking up from the cwd when unset
    pub data_dir: Option<PathBuf>,
    pub search_depth: usize,
    pub candle_interval: Timeframe,
}

impl Default for DataEnvConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            search_depth: 6,
            candle_interval: Timeframe::OneMin,
        }
    }
}

impl DataEnvConfig {
    pub fn from_lookup<F>(file: &FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(data) = &file.data {
            if let Some(dir) = &data.data_dir {
                config.data_dir = Some(dir.clone());
            }
            config.search_depth = data.search_depth.unwrap_or(config.search_depth);
            config.candle_interval = data.candle_interval.unwrap_or(config.candle_interval);
        }

        if let Some(dir) = lookup("DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        config.search_depth = parse_var(&lookup, "DATA_SEARCH_DEPTH", config.search_depth)?;
        config.candle_interval =
            parse_var(&lookup, "CANDLE_INTERVAL", config.candle_interval)?;

        Ok(config)
    }
}

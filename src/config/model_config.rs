//! Model configuration parsing from environment variables.
//!
//! This module handles training hyper-parameters and artifact locations.

use super::{FileConfig, parse_var};
use crate::application::ml::forest_forecaster::ForestParams;
use crate::application::ml::lstm_forecaster::LstmParams;
use crate::application::ml::trainer::TrainingSettings;
use crate::domain::ml::model::ModelKind;
use anyhow::{Result, bail};
use std::path::PathBuf;

/// Model environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEnvConfig {
    pub model_dir: PathBuf,
    pub kind: ModelKind,

    // Windows
    pub lookback: usize,
    pub n_future: usize,
    pub train_split: f64,

    // LSTM
    pub epochs: usize,
    pub batch_size: usize,
    pub hidden_size: usize,
    pub learning_rate: f64,

    // Forest
    pub forest_trees: usize,
    pub forest_max_depth: u16,
    pub forest_min_split: usize,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            kind: ModelKind::Lstm,
            lookback: 5,
            n_future: 5,
            train_split: 0.8,
            epochs: 50,
            batch_size: 64,
            hidden_size: 1024,
            learning_rate: 0.001,
            forest_trees: 100,
            forest_max_depth: 10,
            forest_min_split: 5,
        }
    }
}

impl ModelEnvConfig {
    pub fn from_lookup<F>(file: &FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut c = Self::default();
        if let Some(m) = &file.model {
            if let Some(dir) = &m.model_dir {
                c.model_dir = dir.clone();
            }
            c.kind = m.kind.unwrap_or(c.kind);
            c.lookback = m.lookback.unwrap_or(c.lookback);
            c.n_future = m.n_future.unwrap_or(c.n_future);
            c.train_split = m.train_split.unwrap_or(c.train_split);
            c.epochs = m.epochs.unwrap_or(c.epochs);
            c.batch_size = m.batch_size.unwrap_or(c.batch_size);
            c.hidden_size = m.hidden_size.unwrap_or(c.hidden_size);
            c.learning_rate = m.learning_rate.unwrap_or(c.learning_rate);
            c.forest_trees = m.forest_trees.unwrap_or(c.forest_trees);
            c.forest_max_depth = m.forest_max_depth.unwrap_or(c.forest_max_depth);
            c.forest_min_split = m.forest_min_split.unwrap_or(c.forest_min_split);
        }

        if let Some(dir) = lookup("MODEL_DIR").filter(|d| !d.trim().is_empty()) {
            c.model_dir = PathBuf::from(dir);
        }
        let kind = match lookup("MODEL_KIND") {
            Some(raw) => raw.parse::<ModelKind>()?,
            None => c.kind,
        };

        let config = Self {
            model_dir: c.model_dir,
            kind,
            lookback: parse_var(&lookup, "LOOKBACK", c.lookback)?,
            n_future: parse_var(&lookup, "N_FUTURE", c.n_future)?,
            train_split: parse_var(&lookup, "TRAIN_SPLIT", c.train_split)?,
            epochs: parse_var(&lookup, "EPOCHS", c.epochs)?,
            batch_size: parse_var(&lookup, "BATCH_SIZE", c.batch_size)?,
            hidden_size: parse_var(&lookup, "HIDDEN_SIZE", c.hidden_size)?,
            learning_rate: parse_var(&lookup, "LEARNING_RATE", c.learning_rate)?,
            forest_trees: parse_var(&lookup, "FOREST_TREES", c.forest_trees)?,
            forest_max_depth: parse_var(&lookup, "FOREST_MAX_DEPTH", c.forest_max_depth)?,
            forest_min_split: parse_var(&lookup, "FOREST_MIN_SPLIT", c.forest_min_split)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            bail!("LOOKBACK must be at least 1");
        }
        if self.n_future == 0 {
            bail!("N_FUTURE must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("BATCH_SIZE must be at least 1");
        }
        if self.hidden_size == 0 {
            bail!("HIDDEN_SIZE must be at least 1");
        }
        if self.train_split.is_nan() || self.train_split <= 0.0 || self.train_split >= 1.0 {
            bail!("TRAIN_SPLIT must be in (0, 1), got {}", self.train_split);
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            bail!("LEARNING_RATE must be positive, got {}", self.learning_rate);
        }
        Ok(())
    }

    pub fn training_settings(&self) -> TrainingSettings {
        TrainingSettings {
            kind: self.kind,
            lookback: self.lookback,
            train_split: self.train_split,
            lstm: LstmParams {
                hidden_size: self.hidden_size,
                epochs: self.epochs,
                batch_size: self.batch_size,
                learning_rate: self.learning_rate,
            },
            forest: ForestParams {
                n_trees: self.forest_trees,
                max_depth: self.forest_max_depth,
                min_samples_split: self.forest_min_split,
            },
        }
    }
}

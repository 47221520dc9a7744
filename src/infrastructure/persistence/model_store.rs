use crate::domain::errors::ModelError;
use crate::domain::ml::model::{EpochStats, ModelKind, ModelMetadata};
use crate::domain::ml::scaler::StandardScaler;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// File layout of trained artifacts for each symbol inside the model directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn weights_path(&self, symbol: &str, kind: ModelKind) -> PathBuf {
        match kind {
            ModelKind::Lstm => self.dir.join(format!("{}_model.safetensors", symbol)),
            ModelKind::Forest => self.dir.join(format!("{}_forest.json", symbol)),
        }
    }

    pub fn metadata_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_model.json", symbol))
    }

    pub fn scaler_x_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_scaler_x.json", symbol))
    }

    pub fn scaler_y_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_scaler_y.json", symbol))
    }

    pub fn history_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_history.csv", symbol))
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create model dir {}", self.dir.display()))
    }

    pub fn save_metadata(&self, metadata: &ModelMetadata) -> Result<()> {
        write_json(&self.metadata_path(&metadata.symbol), metadata)
    }

    /// Loads metadata; a missing file means the symbol was never trained.
    pub fn load_metadata(&self, symbol: &str) -> Result<ModelMetadata> {
        let path = self.metadata_path(symbol);
        if !path.exists() {
            return Err(ModelError::NotTrained { path }.into());
        }
        read_json(&path)
    }

    pub fn save_scalers(&self, symbol: &str, x: &StandardScaler, y: &StandardScaler) -> Result<()> {
        write_json(&self.scaler_x_path(symbol), x)?;
        write_json(&self.scaler_y_path(symbol), y)?;
        info!(
            "Saved scalers to: {} {}",
            self.scaler_x_path(symbol).display(),
            self.scaler_y_path(symbol).display()
        );
        Ok(())
    }

    pub fn load_scalers(&self, symbol: &str) -> Result<(StandardScaler, StandardScaler)> {
        Ok((
            read_json(&self.scaler_x_path(symbol))?,
            read_json(&self.scaler_y_path(symbol))?,
        ))
    }

    /// Writes per-epoch losses as CSV (`epoch,train_loss,val_loss,val_mae`).
    pub fn write_history(&self, symbol: &str, history: &[EpochStats]) -> Result<PathBuf> {
        let path = self.history_path(symbol);
        let mut wtr = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for stats in history {
            wtr.serialize(stats)
                .with_context(|| format!("Failed to write epoch {}", stats.epoch))?;
        }
        wtr.flush()?;
        Ok(path)
    }

    pub fn read_history(&self, symbol: &str) -> Result<Vec<EpochStats>> {
        let path = self.history_path(symbol);
        let mut rdr = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut history = Vec::new();
        for record in rdr.deserialize() {
            history.push(record.context("Malformed history row")?);
        }
        Ok(history)
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to serialize {}", path.display()))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ModelError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_paths_follow_symbol() {
        let store = ModelStore::new(PathBuf::from("models"));
        assert_eq!(
            store.weights_path("XRPUSDT", ModelKind::Lstm),
            PathBuf::from("models/XRPUSDT_model.safetensors")
        );
        assert_eq!(
            store.scaler_y_path("XRPUSDT"),
            PathBuf::from("models/XRPUSDT_scaler_y.json")
        );
    }

    #[test]
    fn test_missing_metadata_is_not_trained() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf());

        let err = store.load_metadata("BTCUSDT").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::NotTrained { .. })
        ));
    }

    #[test]
    fn test_metadata_and_history_persist() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf());
        let metadata = ModelMetadata {
            symbol: "BTCUSDT".to_string(),
            kind: ModelKind::Forest,
            lookback: 5,
            hidden_size: 16,
            timeframe: Timeframe::OneMin,
            features: vec!["close".to_string()],
            targets: vec!["open".to_string(), "close".to_string()],
            trained_at: Utc::now(),
        };
        store.save_metadata(&metadata).unwrap();
        assert_eq!(store.load_metadata("BTCUSDT").unwrap(), metadata);

        let history = vec![
            EpochStats {
                epoch: 1,
                train_loss: 0.5,
                val_loss: Some(0.6),
                val_mae: Some(0.4),
            },
            EpochStats {
                epoch: 2,
                train_loss: 0.3,
                val_loss: None,
                val_mae: None,
            },
        ];
        store.write_history("BTCUSDT", &history).unwrap();
        assert_eq!(store.read_history("BTCUSDT").unwrap(), history);
    }
}

use crate::domain::errors::ModelError;
use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which forecaster backs a trained model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Lstm,
    Forest,
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lstm" => Ok(ModelKind::Lstm),
            "forest" | "random_forest" => Ok(ModelKind::Forest),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Lstm => write!(f, "lstm"),
            ModelKind::Forest => write!(f, "forest"),
        }
    }
}

/// Everything needed to rebuild a saved model and its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub symbol: String,
    pub kind: ModelKind,
    pub lookback: usize,
    pub hidden_size: usize,
    pub timeframe: Timeframe,
    pub features: Vec<String>,
    pub targets: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

/// Loss/metric values for one training epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    pub val_mae: Option<f64>,
}

/// Predicted body of the next candle, in price units once unscaled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyForecast {
    pub open: f64,
    pub close: f64,
}

impl BodyForecast {
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [open, close, ..] => Some(Self {
                open: *open,
                close: *close,
            }),
            _ => None,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.open, self.close]
    }
}

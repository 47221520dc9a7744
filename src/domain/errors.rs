use std::path::PathBuf;
use thiserror::Error;

/// Errors related to locating and reading market files
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("No 'data' directory found within {max_up} levels above {start}")]
    DataDirNotFound { start: PathBuf, max_up: usize },

    #[error("Symbol directory not found: {path}")]
    SymbolNotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while turning trades into candles, labels and datasets
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid timestamps: min={min}, max={max}")]
    InvalidTimestamps { min: i64, max: i64 },

    #[error("No trades found for {symbol}")]
    NoTrades { symbol: String },

    #[error("No candles generated for {symbol}")]
    NoCandles { symbol: String },

    #[error("Not enough rows: need {required}, have {available}")]
    NotEnoughRows { required: usize, available: usize },

    #[error("Unknown feature column: {name}")]
    UnknownColumn { name: String },

    #[error("Scaler expects {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Errors related to model training, persistence and inference
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model not found at {path}. Train first.")]
    NotTrained { path: PathBuf },

    #[error("Model was trained with lookback {trained}, requested {requested}")]
    LookbackMismatch { trained: usize, requested: usize },

    #[error("Unknown model kind: '{0}'. Must be 'lstm' or 'forest'")]
    UnknownKind(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Forest model failed: {0}")]
    Forest(String),

    #[error("Model file {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Empty training set")]
    EmptyTrainingSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_formatting() {
        let error = PipelineError::InvalidTimestamps { min: 0, max: 42 };

        let msg = error.to_string();
        assert!(msg.contains("min=0"));
        assert!(msg.contains("max=42"));
    }

    #[test]
    fn test_model_error_formatting() {
        let error = ModelError::LookbackMismatch {
            trained: 5,
            requested: 10,
        };

        let msg = error.to_string();
        assert!(msg.contains("lookback 5"));
        assert!(msg.contains("requested 10"));
    }
}

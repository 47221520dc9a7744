use crate::application::ml::forest_forecaster::{ForestForecaster, ForestParams};
use crate::application::ml::lstm_forecaster::{LstmForecaster, LstmParams};
use crate::application::ml::predictor::Forecaster;
use crate::application::pipeline::{CandleSeries, MarketPipeline};
use crate::domain::errors::{ModelError, PipelineError};
use crate::domain::ml::dataset::build_sequence_dataset;
use crate::domain::ml::feature_registry::{
    BODY_TARGETS, FeatureColumn, SEQUENCE_FEATURES, candle_matrix, parse_columns,
};
use crate::domain::ml::model::{BodyForecast, EpochStats, ModelKind, ModelMetadata};
use crate::domain::ml::scaler::StandardScaler;
use crate::infrastructure::persistence::model_store::ModelStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

/// Rows needed beyond the lookback before training is attempted
pub const MIN_EXTRA_ROWS: usize = 10;

/// How a model is trained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSettings {
    pub kind: ModelKind,
    pub lookback: usize,
    pub train_split: f64,
    pub lstm: LstmParams,
    pub forest: ForestParams,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            kind: ModelKind::Lstm,
            lookback: 5,
            train_split: 0.8,
            lstm: LstmParams::default(),
            forest: ForestParams::default(),
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub symbol: String,
    pub kind: ModelKind,
    pub samples: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub parameter_count: Option<usize>,
    pub history: Vec<EpochStats>,
    pub weights_path: PathBuf,
    pub history_path: PathBuf,
}

impl TrainingReport {
    pub fn final_stats(&self) -> Option<&EpochStats> {
        self.history.last()
    }
}

/// Trains next-candle models and serves predictions from saved ones
#[derive(Debug, Clone)]
pub struct ForecastService {
    pipeline: MarketPipeline,
    store: ModelStore,
}

impl ForecastService {
    pub fn new(pipeline: MarketPipeline, store: ModelStore) -> Self {
        Self { pipeline, store }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn train(&self, symbol: &str, settings: &TrainingSettings) -> Result<TrainingReport> {
        let series = self.pipeline.load(symbol)?;
        self.train_on_series(&series, settings)
    }

    /// Scales features and targets, fits the model on the chronological head
    /// of the windows and writes weights, scalers, metadata and history.
    pub fn train_on_series(
        &self,
        series: &CandleSeries,
        settings: &TrainingSettings,
    ) -> Result<TrainingReport> {
        let symbol = series.symbol.as_str();
        let lookback = settings.lookback.max(1);
        let (features, targets) = clean_rows(series, SEQUENCE_FEATURES, BODY_TARGETS);

        let required = lookback + MIN_EXTRA_ROWS;
        if features.len() < required {
            return Err(PipelineError::NotEnoughRows {
                required,
                available: features.len(),
            }
            .into());
        }

        let scaler_x = StandardScaler::fit(&features, column_names(SEQUENCE_FEATURES))?;
        let scaler_y = StandardScaler::fit(&targets, column_names(BODY_TARGETS))?;
        let dataset = build_sequence_dataset(
            &scaler_x.transform(&features)?,
            &scaler_y.transform(&targets)?,
            lookback,
        );
        let samples = dataset.len();
        info!("Dataset shape: {:?}", dataset.shape());

        let (train, val) = dataset.split(settings.train_split);
        info!("Train: {}, Val: {}", train.len(), val.len());
        if train.is_empty() {
            return Err(ModelError::EmptyTrainingSet.into());
        }

        self.store.ensure_dir()?;
        let weights_path = self.store.weights_path(symbol, settings.kind);
        let (history, parameter_count) = match settings.kind {
            ModelKind::Lstm => {
                let mut model = LstmForecaster::new(
                    train.n_features,
                    settings.lstm.hidden_size,
                    train.n_targets,
                )?;
                info!(
                    "LSTM model: {} features, hidden {}, {} parameters",
                    train.n_features,
                    settings.lstm.hidden_size,
                    model.parameter_count().unwrap_or_default()
                );
                let history = model.fit(&train, &val, &settings.lstm)?;
                model.save(&weights_path)?;
                (history, model.parameter_count())
            }
            ModelKind::Forest => {
                let (model, history) = ForestForecaster::fit(&train, &val, &settings.forest)?;
                model.save(&weights_path)?;
                (history, model.parameter_count())
            }
        };

        self.store.save_scalers(symbol, &scaler_x, &scaler_y)?;
        self.store.save_metadata(&ModelMetadata {
            symbol: symbol.to_string(),
            kind: settings.kind,
            lookback,
            hidden_size: settings.lstm.hidden_size,
            timeframe: series.timeframe,
            features: scaler_x.columns.clone(),
            targets: scaler_y.columns.clone(),
            trained_at: Utc::now(),
        })?;
        let history_path = self
            .store
            .write_history(symbol, &history)
            .context("Failed to write training history")?;
        info!("Saved training history to: {}", history_path.display());

        Ok(TrainingReport {
            symbol: symbol.to_string(),
            kind: settings.kind,
            samples,
            train_samples: train.len(),
            val_samples: val.len(),
            parameter_count,
            history,
            weights_path,
            history_path,
        })
    }

    pub fn predict(&self, symbol: &str, lookback: Option<usize>) -> Result<BodyForecast> {
        // Fail on a missing model before touching market data
        let metadata = self.checked_metadata(symbol, lookback)?;
        let series = self.pipeline.load(symbol)?;
        self.forecast(&series, &metadata)
    }

    /// Predicts the candle after the last one in `series` with the saved model.
    pub fn predict_on_series(
        &self,
        series: &CandleSeries,
        lookback: Option<usize>,
    ) -> Result<BodyForecast> {
        let metadata = self.checked_metadata(&series.symbol, lookback)?;
        self.forecast(series, &metadata)
    }

    fn checked_metadata(&self, symbol: &str, lookback: Option<usize>) -> Result<ModelMetadata> {
        let metadata = self.store.load_metadata(symbol)?;
        match lookback {
            Some(requested) if requested != metadata.lookback => Err(ModelError::LookbackMismatch {
                trained: metadata.lookback,
                requested,
            }
            .into()),
            _ => Ok(metadata),
        }
    }

    fn forecast(&self, series: &CandleSeries, metadata: &ModelMetadata) -> Result<BodyForecast> {
        let symbol = series.symbol.as_str();
        if metadata.timeframe != series.timeframe {
            warn!(
                "{} model was trained on {} candles, predicting from {}",
                symbol, metadata.timeframe, series.timeframe
            );
        }

        let columns = parse_columns(&metadata.features.join(","))?;
        let (scaler_x, scaler_y) = self.store.load_scalers(symbol)?;
        let (features, _) = clean_rows(series, &columns, BODY_TARGETS);
        if features.len() < metadata.lookback {
            return Err(PipelineError::NotEnoughRows {
                required: metadata.lookback,
                available: features.len(),
            }
            .into());
        }

        let window = scaler_x.transform(&features[features.len() - metadata.lookback..])?;
        let model = self.load_forecaster(metadata, columns.len(), scaler_y.width())?;
        let scaled = model.predict(&window)?;
        let unscaled = scaler_y.inverse_transform_row(&scaled)?;

        let forecast = BodyForecast::from_slice(&unscaled).ok_or(PipelineError::ShapeMismatch {
            expected: 2,
            actual: unscaled.len(),
        })?;
        info!(
            "{} next candle ({}): open={:.6} close={:.6}",
            symbol,
            model.name(),
            forecast.open,
            forecast.close
        );
        Ok(forecast)
    }

    fn load_forecaster(
        &self,
        metadata: &ModelMetadata,
        n_features: usize,
        n_targets: usize,
    ) -> Result<Box<dyn Forecaster>, ModelError> {
        let path = self.store.weights_path(&metadata.symbol, metadata.kind);
        Ok(match metadata.kind {
            ModelKind::Lstm => Box::new(LstmForecaster::load(
                &path,
                n_features,
                metadata.hidden_size,
                n_targets,
            )?),
            ModelKind::Forest => Box::new(ForestForecaster::load(&path)?),
        })
    }
}

fn column_names(columns: &[FeatureColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Feature and target rows with every non-finite row dropped from both
fn clean_rows(
    series: &CandleSeries,
    features: &[FeatureColumn],
    targets: &[FeatureColumn],
) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let x = candle_matrix(&series.candles, features);
    let y = candle_matrix(&series.candles, targets);
    let before = x.len();

    let (x, y): (Vec<_>, Vec<_>) = x
        .into_iter()
        .zip(y)
        .filter(|(fx, fy)| fx.iter().chain(fy.iter()).all(|v| v.is_finite()))
        .unzip();
    if x.len() < before {
        warn!("Dropped {} rows with non-finite values", before - x.len());
    }
    (x, y)
}

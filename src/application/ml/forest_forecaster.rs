use crate::application::ml::predictor::{Forecaster, evaluate};
use crate::domain::errors::ModelError;
use crate::domain::ml::dataset::WindowDataset;
use crate::domain::ml::model::EpochStats;
use crate::infrastructure::persistence::model_store::{read_json, write_json};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::path::Path;
use tracing::info;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
        }
    }
}

/// One random forest per target over flattened windows
#[derive(Serialize, Deserialize)]
pub struct ForestForecaster {
    forests: Vec<Forest>,
}

impl ForestForecaster {
    /// Fits the forests; the single history entry holds train and validation error.
    pub fn fit(
        train: &WindowDataset,
        val: &WindowDataset,
        params: &ForestParams,
    ) -> Result<(Self, Vec<EpochStats>), ModelError> {
        if train.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        info!(
            "Training Random Forest Regressor (Trees: {}, Depth: {}, MinSplit: {})...",
            params.n_trees, params.max_depth, params.min_samples_split
        );
        let x_matrix = DenseMatrix::from_2d_vec(&train.flattened_x())
            .map_err(|e| ModelError::Forest(format!("Matrix error: {}", e)))?;

        let mut forests = Vec::with_capacity(train.n_targets);
        for target in 0..train.n_targets {
            let forest_params = RandomForestRegressorParameters::default()
                .with_n_trees(params.n_trees)
                .with_max_depth(params.max_depth)
                .with_min_samples_split(params.min_samples_split);
            let forest = RandomForestRegressor::fit(
                &x_matrix,
                &train.target_column(target),
                forest_params,
            )
            .map_err(|e| ModelError::Forest(format!("Training error: {}", e)))?;
            forests.push(forest);
        }
        let model = Self { forests };

        let train_loss = evaluate(&model, &train.x, &train.y)?.map_or(f64::NAN, |(mse, _)| mse);
        let val_metrics = evaluate(&model, &val.x, &val.y)?;
        let stats = EpochStats {
            epoch: 1,
            train_loss,
            val_loss: val_metrics.map(|(mse, _)| mse),
            val_mae: val_metrics.map(|(_, mae)| mae),
        };
        info!(
            "Forest fit: train_mse={:.6} val_mse={:?} val_mae={:?}",
            stats.train_loss, stats.val_loss, stats.val_mae
        );

        Ok((model, vec![stats]))
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        write_json(path, self).map_err(|e| ModelError::Forest(format!("{:#}", e)))?;
        info!("Saved model to: {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotTrained {
                path: path.to_path_buf(),
            });
        }
        read_json(path).map_err(|e| match e.downcast::<ModelError>() {
            Ok(model_error) => model_error,
            Err(other) => ModelError::Forest(format!("{:#}", other)),
        })
    }
}

impl Forecaster for ForestForecaster {
    fn predict(&self, window: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let input = DenseMatrix::from_2d_vec(&vec![window.concat()])
            .map_err(|e| ModelError::Forest(format!("Matrix creation failed: {}", e)))?;

        let mut out = Vec::with_capacity(self.forests.len());
        for forest in &self.forests {
            let predictions = forest
                .predict(&input)
                .map_err(|e| ModelError::Forest(format!("Prediction failed: {}", e)))?;
            let value = predictions
                .first()
                .copied()
                .ok_or_else(|| ModelError::Forest("No prediction returned".to_string()))?;
            out.push(value);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "SmartCore Random Forest"
    }
}

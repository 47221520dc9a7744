use crate::domain::errors::ModelError;

/// Interface for next-candle models.
///
/// Inputs and outputs live in scaled space; callers own the scalers.
pub trait Forecaster: Send + Sync {
    /// Predicts the scaled `[open, close]` of the candle following `window`
    /// (`lookback` rows of features, oldest first).
    fn predict(&self, window: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Number of trainable parameters, when the model has a fixed count
    fn parameter_count(&self) -> Option<usize> {
        None
    }
}

/// Mean squared and mean absolute error of a forecaster over a dataset
pub fn evaluate(
    model: &dyn Forecaster,
    x: &[Vec<Vec<f64>>],
    y: &[Vec<f64>],
) -> Result<Option<(f64, f64)>, ModelError> {
    let mut sq = 0.0;
    let mut abs = 0.0;
    let mut count = 0usize;

    for (window, target) in x.iter().zip(y) {
        let pred = model.predict(window)?;
        for (p, t) in pred.iter().zip(target) {
            sq += (p - t).powi(2);
            abs += (p - t).abs();
            count += 1;
        }
    }

    if count == 0 {
        return Ok(None);
    }
    Ok(Some((sq / count as f64, abs / count as f64)))
}

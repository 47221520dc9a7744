use crate::application::ml::predictor::Forecaster;
use crate::domain::errors::ModelError;
use crate::domain::ml::dataset::WindowDataset;
use crate::domain::ml::model::EpochStats;
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    AdamW, LSTM, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, RNN, VarBuilder, VarMap,
};
use rand::seq::SliceRandom;
use std::path::Path;
use tracing::{debug, info};

/// Hyper-parameters of the recurrent forecaster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LstmParams {
    pub hidden_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for LstmParams {
    fn default() -> Self {
        Self {
            hidden_size: 1024,
            epochs: 50,
            batch_size: 64,
            learning_rate: 0.001,
        }
    }
}

/// LSTM(hidden) → Dense(hidden, relu) → Dense(targets)
struct BodyNet {
    lstm: LSTM,
    dense: Linear,
    head: Linear,
}

impl BodyNet {
    fn new(
        vb: VarBuilder,
        n_features: usize,
        hidden_size: usize,
        n_targets: usize,
    ) -> candle_core::Result<Self> {
        let lstm = candle_nn::lstm(n_features, hidden_size, LSTMConfig::default(), vb.pp("lstm"))?;
        let dense = candle_nn::linear(hidden_size, hidden_size, vb.pp("dense"))?;
        let head = candle_nn::linear(hidden_size, n_targets, vb.pp("head"))?;
        Ok(Self { lstm, dense, head })
    }

    /// `x`: (batch, lookback, features) → (batch, targets)
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let states = self.lstm.seq(x)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("empty input sequence".to_string()))?;
        let hidden = self.dense.forward(last.h())?.relu()?;
        self.head.forward(&hidden)
    }
}

/// Recurrent next-candle forecaster on CPU, weights stored as safetensors
pub struct LstmForecaster {
    varmap: VarMap,
    net: BodyNet,
    device: Device,
    n_features: usize,
    n_targets: usize,
}

impl LstmForecaster {
    pub fn new(
        n_features: usize,
        hidden_size: usize,
        n_targets: usize,
    ) -> Result<Self, ModelError> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = BodyNet::new(vb, n_features, hidden_size, n_targets)?;
        Ok(Self {
            varmap,
            net,
            device,
            n_features,
            n_targets,
        })
    }

    /// Rebuilds the network and loads weights written by [`LstmForecaster::save`].
    pub fn load(
        path: &Path,
        n_features: usize,
        hidden_size: usize,
        n_targets: usize,
    ) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotTrained {
                path: path.to_path_buf(),
            });
        }
        let mut model = Self::new(n_features, hidden_size, n_targets)?;
        model.varmap.load(path).map_err(|e| ModelError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        self.varmap.save(path)?;
        info!("Saved model to: {}", path.display());
        Ok(())
    }

    /// Trains with Adam on mean squared error, one [`EpochStats`] per epoch.
    pub fn fit(
        &mut self,
        train: &WindowDataset,
        val: &WindowDataset,
        params: &LstmParams,
    ) -> Result<Vec<EpochStats>, ModelError> {
        if train.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let batch_size = params.batch_size.max(1);
        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: params.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = Vec::with_capacity(params.epochs);
        let mut best_val = f64::INFINITY;
        let mut rng = rand::rng();

        for epoch in 1..=params.epochs {
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            for batch in order.chunks(batch_size) {
                let (x, y) = self.batch_tensors(train, batch)?;
                let pred = self.net.forward(&x)?;
                let loss = candle_nn::loss::mse(&pred, &y)?;
                optimizer.backward_step(&loss)?;
                loss_sum += loss.to_scalar::<f32>()? as f64 * batch.len() as f64;
            }
            let train_loss = loss_sum / train.len() as f64;

            let (val_loss, val_mae) = match self.evaluate(val, batch_size)? {
                Some((mse, mae)) => (Some(mse), Some(mae)),
                None => (None, None),
            };
            let marker = match val_loss {
                Some(v) if v < best_val => {
                    best_val = v;
                    " *"
                }
                _ => "",
            };

            info!(
                "Epoch {:3}/{}: loss={:.6} val_loss={} val_mae={}{}",
                epoch,
                params.epochs,
                train_loss,
                val_loss.map_or("-".to_string(), |v| format!("{:.6}", v)),
                val_mae.map_or("-".to_string(), |v| format!("{:.6}", v)),
                marker
            );
            history.push(EpochStats {
                epoch,
                train_loss,
                val_loss,
                val_mae,
            });
        }

        Ok(history)
    }

    /// Mean squared and absolute error over a dataset, `None` when empty
    pub fn evaluate(
        &self,
        data: &WindowDataset,
        batch_size: usize,
    ) -> Result<Option<(f64, f64)>, ModelError> {
        if data.is_empty() {
            return Ok(None);
        }
        let indices: Vec<usize> = (0..data.len()).collect();
        let mut sq_sum = 0.0;
        let mut abs_sum = 0.0;

        for batch in indices.chunks(batch_size.max(1)) {
            let (x, y) = self.batch_tensors(data, batch)?;
            let pred = self.net.forward(&x)?;
            let diff = (&pred - &y)?;
            sq_sum += diff.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
            abs_sum += diff.abs()?.sum_all()?.to_scalar::<f32>()? as f64;
        }

        let count = (data.len() * self.n_targets) as f64;
        Ok(Some((sq_sum / count, abs_sum / count)))
    }

    fn batch_tensors(
        &self,
        data: &WindowDataset,
        indices: &[usize],
    ) -> Result<(Tensor, Tensor), ModelError> {
        let lookback = data.lookback;
        let mut xs = Vec::with_capacity(indices.len() * lookback * self.n_features);
        let mut ys = Vec::with_capacity(indices.len() * self.n_targets);

        for &i in indices {
            for row in &data.x[i] {
                check_width(row.len(), self.n_features)?;
                xs.extend(row.iter().map(|v| *v as f32));
            }
            check_width(data.y[i].len(), self.n_targets)?;
            ys.extend(data.y[i].iter().map(|v| *v as f32));
        }

        let x = Tensor::from_vec(xs, (indices.len(), lookback, self.n_features), &self.device)?;
        let y = Tensor::from_vec(ys, (indices.len(), self.n_targets), &self.device)?;
        Ok((x, y))
    }
}

fn check_width(actual: usize, expected: usize) -> Result<(), ModelError> {
    if actual != expected {
        return Err(candle_core::Error::Msg(format!(
            "expected {} columns, got {}",
            expected, actual
        ))
        .into());
    }
    Ok(())
}

impl Forecaster for LstmForecaster {
    fn predict(&self, window: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let mut xs = Vec::with_capacity(window.len() * self.n_features);
        for row in window {
            check_width(row.len(), self.n_features)?;
            xs.extend(row.iter().map(|v| *v as f32));
        }
        let x = Tensor::from_vec(xs, (1, window.len(), self.n_features), &self.device)?;
        let out = self.net.forward(&x)?.to_vec2::<f32>()?;
        debug!("LSTM output: {:?}", out);

        Ok(out
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(f64::from)
            .collect())
    }

    fn name(&self) -> &str {
        "lstm"
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(self.varmap.all_vars().iter().map(|v| v.elem_count()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::dataset::build_sequence_dataset;
    use tempfile::TempDir;

    fn toy_dataset() -> WindowDataset {
        let features: Vec<Vec<f64>> = (0..24)
            .map(|i| vec![(i as f64 * 0.3).sin(), (i as f64 * 0.3).cos()])
            .collect();
        let targets: Vec<Vec<f64>> = features.iter().map(|r| vec![r[0], r[1]]).collect();
        build_sequence_dataset(&features, &targets, 4)
    }

    fn small_params() -> LstmParams {
        LstmParams {
            hidden_size: 8,
            epochs: 3,
            batch_size: 8,
            learning_rate: 0.01,
        }
    }

    #[test]
    fn test_predict_shape() {
        let model = LstmForecaster::new(2, 8, 2).unwrap();
        let window = vec![vec![0.1, 0.2]; 4];

        let out = model.predict(&window).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_finite()));
        // lstm weights 4*8*(2+8) and biases 2*4*8, dense 8*8+8, head 8*2+2
        assert_eq!(model.parameter_count(), Some(320 + 64 + 72 + 18));
    }

    #[test]
    fn test_fit_records_history() {
        let (train, val) = toy_dataset().split(0.8);
        let mut model = LstmForecaster::new(2, 8, 2).unwrap();

        let history = model.fit(&train, &val, &small_params()).unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].epoch, 1);
        assert!(history.iter().all(|h| h.train_loss.is_finite()));
        assert!(history.iter().all(|h| h.val_loss.is_some() && h.val_mae.is_some()));
    }

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let mut model = LstmForecaster::new(2, 8, 2).unwrap();
        let empty = build_sequence_dataset(&[], &[], 4);

        assert!(matches!(
            model.fit(&empty, &empty, &small_params()),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_save_and_load_reproduce_predictions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = LstmForecaster::new(2, 8, 2).unwrap();
        let window = vec![vec![0.5, -0.5]; 4];
        let before = model.predict(&window).unwrap();

        model.save(&path).unwrap();
        let loaded = LstmForecaster::load(&path, 2, 8, 2).unwrap();
        let after = loaded.predict(&window).unwrap();

        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_missing_weights() {
        let dir = TempDir::new().unwrap();
        let result = LstmForecaster::load(&dir.path().join("none.safetensors"), 2, 8, 2);
        assert!(matches!(result, Err(ModelError::NotTrained { .. })));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model = LstmForecaster::new(2, 8, 2).unwrap();
        assert!(model.predict(&[vec![1.0, 2.0, 3.0]]).is_err());
    }
}

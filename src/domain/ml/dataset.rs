use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::ml::feature_registry::{FeatureColumn, candle_matrix};
use crate::domain::ml::labels::FutureRanges;

/// Sliding-window samples: `x[s]` is `lookback` rows of `n_features`,
/// `y[s]` the target vector for the row right after the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDataset {
    pub x: Vec<Vec<Vec<f64>>>,
    pub y: Vec<Vec<f64>>,
    pub lookback: usize,
    pub n_features: usize,
    pub n_targets: usize,
}

impl WindowDataset {
    fn empty(lookback: usize, n_features: usize, n_targets: usize) -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            lookback,
            n_features,
            n_targets,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `((samples, lookback, features), (samples, targets))`
    pub fn shape(&self) -> ((usize, usize, usize), (usize, usize)) {
        (
            (self.len(), self.lookback, self.n_features),
            (self.len(), self.n_targets),
        )
    }

    /// Chronological split at `floor(len * train_fraction)`.
    pub fn split(self, train_fraction: f64) -> (WindowDataset, WindowDataset) {
        let cut = ((self.len() as f64) * train_fraction.clamp(0.0, 1.0)).floor() as usize;
        let cut = cut.min(self.len());

        let mut x_train = self.x;
        let mut y_train = self.y;
        let x_val = x_train.split_off(cut);
        let y_val = y_train.split_off(cut);

        let head = WindowDataset {
            x: x_train,
            y: y_train,
            lookback: self.lookback,
            n_features: self.n_features,
            n_targets: self.n_targets,
        };
        let tail = WindowDataset {
            x: x_val,
            y: y_val,
            lookback: self.lookback,
            n_features: self.n_features,
            n_targets: self.n_targets,
        };
        (head, tail)
    }

    /// Window rows concatenated per sample, for models without a time axis
    pub fn flattened_x(&self) -> Vec<Vec<f64>> {
        self.x.iter().map(|w| w.concat()).collect()
    }

    /// Column `target` of every label vector
    pub fn target_column(&self, target: usize) -> Vec<f64> {
        self.y.iter().map(|t| t[target]).collect()
    }
}

/// Builds the future-range dataset.
///
/// For each `i` in `lookback .. N - n_future` the window is candles
/// `[i - lookback, i)` and the target is the label vector of candle `i`.
/// Samples whose labels are missing or non-finite are skipped.
pub fn build_range_dataset(
    candles: &[FlowCandle],
    labels: &[Option<FutureRanges>],
    lookback: usize,
    n_future: usize,
    features: &[FeatureColumn],
) -> WindowDataset {
    let mut dataset = WindowDataset::empty(lookback, features.len(), 2 * n_future);
    let n = candles.len().min(labels.len());
    if lookback == 0 || n < lookback + n_future {
        return dataset;
    }

    let rows = candle_matrix(&candles[..n], features);
    for i in lookback..n - n_future {
        let Some(ranges) = labels[i].as_ref() else {
            continue;
        };
        if ranges.horizon() != n_future || !ranges.is_finite() {
            continue;
        }
        dataset.x.push(rows[i - lookback..i].to_vec());
        dataset.y.push(ranges.to_vec());
    }
    dataset
}

/// Builds the next-candle dataset from already scaled feature and target rows.
///
/// For each `i` in `lookback .. N` the window is rows `[i - lookback, i)` and
/// the target is `targets[i]`.
pub fn build_sequence_dataset(
    features: &[Vec<f64>],
    targets: &[Vec<f64>],
    lookback: usize,
) -> WindowDataset {
    let n_features = features.first().map_or(0, Vec::len);
    let n_targets = targets.first().map_or(0, Vec::len);
    let mut dataset = WindowDataset::empty(lookback, n_features, n_targets);
    let n = features.len().min(targets.len());
    if lookback == 0 || n <= lookback {
        return dataset;
    }

    for i in lookback..n {
        let target = &targets[i];
        if target.iter().any(|v| !v.is_finite()) {
            continue;
        }
        dataset.x.push(features[i - lookback..i].to_vec());
        dataset.y.push(target.clone());
    }
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use crate::domain::ml::feature_registry::RANGE_FEATURES;
    use crate::domain::ml::labels::build_future_ranges;
    use rust_decimal::Decimal;

    fn series(n: usize) -> Vec<FlowCandle> {
        (0..n)
            .map(|i| {
                let price = Decimal::from(100 + i as i64);
                FlowCandle::flat(i as i64 * 60_000, Timeframe::OneMin, price, price)
            })
            .collect()
    }

    #[test]
    fn test_range_dataset_shapes() {
        let candles = series(30);
        let labels = build_future_ranges(&candles, 5);

        let ds = build_range_dataset(&candles, &labels, 10, 5, RANGE_FEATURES);

        // i in 10..25
        assert_eq!(ds.shape(), ((15, 10, 5), (15, 10)));
        // first window ends right before candle 10
        assert_eq!(ds.x[0][9][0], 109.0);
    }

    #[test]
    fn test_range_dataset_too_short() {
        let candles = series(12);
        let labels = build_future_ranges(&candles, 5);

        let ds = build_range_dataset(&candles, &labels, 10, 5, RANGE_FEATURES);
        assert!(ds.is_empty());
        assert_eq!(ds.shape(), ((0, 10, 5), (0, 10)));
    }

    #[test]
    fn test_sequence_dataset_targets_follow_window() {
        let features: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, 0.0]).collect();
        let targets: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64 * 10.0, 1.0]).collect();

        let ds = build_sequence_dataset(&features, &targets, 3);

        assert_eq!(ds.len(), 5);
        assert_eq!(ds.x[0], vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]]);
        assert_eq!(ds.y[0], vec![30.0, 1.0]);
        assert_eq!(ds.y[4], vec![70.0, 1.0]);
    }

    #[test]
    fn test_split_is_chronological() {
        let features: Vec<Vec<f64>> = (0..15).map(|i| vec![i as f64]).collect();
        let ds = build_sequence_dataset(&features, &features, 5);

        let (train, val) = ds.split(0.8);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        assert_eq!(val.y[0], vec![13.0]);
    }

    #[test]
    fn test_flattened_x() {
        let features: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64, -(i as f64)]).collect();
        let ds = build_sequence_dataset(&features, &features, 2);

        assert_eq!(ds.flattened_x(), vec![vec![0.0, 0.0, 1.0, -1.0]]);
        assert_eq!(ds.target_column(1), vec![-2.0]);
    }
}

use crate::domain::market::flow_candle::FlowCandle;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Forward-looking price excursion labels for one candle.
///
/// `up[k-1]` is the largest relative rise of the high over the next `k`
/// candles measured from this close; `down[k-1]` the largest relative drop of
/// the low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRanges {
    pub up: Vec<f64>,
    pub down: Vec<f64>,
}

impl FutureRanges {
    pub fn horizon(&self) -> usize {
        self.up.len()
    }

    /// `[up_1..up_n, down_1..down_n]`
    pub fn to_vec(&self) -> Vec<f64> {
        self.up.iter().chain(self.down.iter()).copied().collect()
    }

    pub fn is_finite(&self) -> bool {
        self.up.iter().chain(self.down.iter()).all(|v| v.is_finite())
    }
}

/// Column names matching [`FutureRanges::to_vec`]
pub fn label_names(n_future: usize) -> Vec<String> {
    (1..=n_future)
        .map(|k| format!("future_up_{}", k))
        .chain((1..=n_future).map(|k| format!("future_down_{}", k)))
        .collect()
}

/// Computes future-range labels for every candle.
///
/// The last candle has nothing ahead of it and gets `None`. Candles closer to
/// the end than `n_future` use the shorter horizon that is available.
pub fn build_future_ranges(candles: &[FlowCandle], n_future: usize) -> Vec<Option<FutureRanges>> {
    let n = candles.len();
    let highs: Vec<f64> = candles.iter().map(|c| c.high.to_f64().unwrap_or(f64::NAN)).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low.to_f64().unwrap_or(f64::NAN)).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close.to_f64().unwrap_or(f64::NAN)).collect();

    (0..n)
        .map(|i| {
            if i + 1 >= n {
                return None;
            }

            let close = closes[i];
            let mut max_high = f64::NEG_INFINITY;
            let mut min_low = f64::INFINITY;
            let mut up = Vec::with_capacity(n_future);
            let mut down = Vec::with_capacity(n_future);

            for k in 1..=n_future {
                // Window i+1 .. min(n, i+k+1) grows by one candle per horizon
                let j = i + k;
                if j < n {
                    max_high = max_high.max(highs[j]);
                    min_low = min_low.min(lows[j]);
                }
                up.push((max_high - close) / close);
                down.push((close - min_low) / close);
            }

            Some(FutureRanges { up, down })
        })
        .collect()
}

use serde::{Deserialize, Serialize};

/// Number of book levels summed on each side
pub const DEPTH_LEVELS: usize = 10;

/// Order book liquidity summary attached to a candle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthFeatures {
    pub bid_liq: f64,
    pub ask_liq: f64,
    pub depth_imbalance: f64,
    pub spread: f64,
    pub mid_price: f64,
}

impl DepthFeatures {
    /// Aggregates the top [`DEPTH_LEVELS`] of a book given as `(price, qty)` levels,
    /// best price first. Returns `None` when either side is empty.
    pub fn from_levels(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Option<Self> {
        let (best_bid, _) = *bids.first()?;
        let (best_ask, _) = *asks.first()?;

        let bid_liq: f64 = bids.iter().take(DEPTH_LEVELS).map(|(_, q)| q).sum();
        let ask_liq: f64 = asks.iter().take(DEPTH_LEVELS).map(|(_, q)| q).sum();

        Some(Self {
            bid_liq,
            ask_liq,
            depth_imbalance: (bid_liq - ask_liq) / (bid_liq + ask_liq + 1e-12),
            spread: best_ask - best_bid,
            mid_price: (best_ask + best_bid) / 2.0,
        })
    }
}

/// Depth features observed at some raw timestamp (ms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRecord {
    pub timestamp: i64,
    pub features: DepthFeatures,
}

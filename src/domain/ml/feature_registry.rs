use crate::domain::errors::PipelineError;
use crate::domain::market::flow_candle::FlowCandle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;
use std::str::FromStr;

/// Numeric columns a candle exposes to datasets and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Open,
    High,
    Low,
    Close,
    VolumeBase,
    QuoteVolume,
    BuyQuoteVolume,
    SellQuoteVolume,
    DeltaUsdt,
    Imbalance,
    Vwap,
    TradeCount,
    BidLiq,
    AskLiq,
    DepthImbalance,
    Spread,
    MidPrice,
}

/// Inputs of the future-range dataset.
pub const RANGE_FEATURES: &[FeatureColumn] = &[
    FeatureColumn::Close,
    FeatureColumn::QuoteVolume,
    FeatureColumn::DeltaUsdt,
    FeatureColumn::Imbalance,
    FeatureColumn::Vwap,
];

/// Inputs of the next-candle sequence model.
/// Any change here is a breaking change for saved models and scalers.
pub const SEQUENCE_FEATURES: &[FeatureColumn] = &[
    FeatureColumn::Close,
    FeatureColumn::QuoteVolume,
    FeatureColumn::DeltaUsdt,
    FeatureColumn::Imbalance,
    FeatureColumn::Vwap,
    FeatureColumn::BidLiq,
    FeatureColumn::AskLiq,
    FeatureColumn::DepthImbalance,
    FeatureColumn::Spread,
    FeatureColumn::MidPrice,
];

/// Targets of the next-candle sequence model, in output order.
pub const BODY_TARGETS: &[FeatureColumn] = &[FeatureColumn::Open, FeatureColumn::Close];

impl FeatureColumn {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Open => "open",
            FeatureColumn::High => "high",
            FeatureColumn::Low => "low",
            FeatureColumn::Close => "close",
            FeatureColumn::VolumeBase => "volume_base",
            FeatureColumn::QuoteVolume => "quote_volume",
            FeatureColumn::BuyQuoteVolume => "buy_quote_volume",
            FeatureColumn::SellQuoteVolume => "sell_quote_volume",
            FeatureColumn::DeltaUsdt => "delta_usdt",
            FeatureColumn::Imbalance => "imbalance",
            FeatureColumn::Vwap => "vwap",
            FeatureColumn::TradeCount => "trade_count",
            FeatureColumn::BidLiq => "bid_liq",
            FeatureColumn::AskLiq => "ask_liq",
            FeatureColumn::DepthImbalance => "depth_imbalance",
            FeatureColumn::Spread => "spread",
            FeatureColumn::MidPrice => "mid_price",
        }
    }

    pub fn all() -> &'static [FeatureColumn] {
        &[
            FeatureColumn::Open,
            FeatureColumn::High,
            FeatureColumn::Low,
            FeatureColumn::Close,
            FeatureColumn::VolumeBase,
            FeatureColumn::QuoteVolume,
            FeatureColumn::BuyQuoteVolume,
            FeatureColumn::SellQuoteVolume,
            FeatureColumn::DeltaUsdt,
            FeatureColumn::Imbalance,
            FeatureColumn::Vwap,
            FeatureColumn::TradeCount,
            FeatureColumn::BidLiq,
            FeatureColumn::AskLiq,
            FeatureColumn::DepthImbalance,
            FeatureColumn::Spread,
            FeatureColumn::MidPrice,
        ]
    }

    /// Reads this column from a candle as f64
    pub fn value(&self, candle: &FlowCandle) -> f64 {
        match self {
            FeatureColumn::Open => dec_f64(candle.open),
            FeatureColumn::High => dec_f64(candle.high),
            FeatureColumn::Low => dec_f64(candle.low),
            FeatureColumn::Close => dec_f64(candle.close),
            FeatureColumn::VolumeBase => dec_f64(candle.volume_base),
            FeatureColumn::QuoteVolume => dec_f64(candle.quote_volume),
            FeatureColumn::BuyQuoteVolume => dec_f64(candle.buy_quote_volume),
            FeatureColumn::SellQuoteVolume => dec_f64(candle.sell_quote_volume),
            FeatureColumn::DeltaUsdt => dec_f64(candle.delta_usdt()),
            FeatureColumn::Imbalance => candle.imbalance(),
            FeatureColumn::Vwap => dec_f64(candle.vwap),
            FeatureColumn::TradeCount => candle.trade_count as f64,
            FeatureColumn::BidLiq => candle.depth.bid_liq,
            FeatureColumn::AskLiq => candle.depth.ask_liq,
            FeatureColumn::DepthImbalance => candle.depth.depth_imbalance,
            FeatureColumn::Spread => candle.depth.spread,
            FeatureColumn::MidPrice => candle.depth.mid_price,
        }
    }
}

impl FromStr for FeatureColumn {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureColumn::all()
            .iter()
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| PipelineError::UnknownColumn {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn dec_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Extracts one row per candle with the given columns.
pub fn candle_matrix(candles: &[FlowCandle], columns: &[FeatureColumn]) -> Vec<Vec<f64>> {
    candles
        .iter()
        .map(|c| columns.iter().map(|col| col.value(c)).collect())
        .collect()
}

/// Parses a comma separated list of column names.
pub fn parse_columns(list: &str) -> Result<Vec<FeatureColumn>, PipelineError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(FeatureColumn::from_str)
        .collect()
}

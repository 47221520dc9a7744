use crate::domain::market::depth::DepthFeatures;
use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Fixed-interval candle with order-flow features, built from trades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCandle {
    /// Start timestamp of this period (in milliseconds)
    pub open_time: i64,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Sum of base-asset quantity
    pub volume_base: Decimal,
    /// Sum of quote-asset notional
    pub quote_volume: Decimal,
    /// Quote notional of aggressive buys
    pub buy_quote_volume: Decimal,
    /// Quote notional of aggressive sells
    pub sell_quote_volume: Decimal,
    pub trade_count: u64,
    pub vwap: Decimal,
    #[serde(default)]
    pub depth: DepthFeatures,
}

impl FlowCandle {
    /// A no-trade candle carrying the previous close forward
    pub fn flat(open_time: i64, timeframe: Timeframe, prev_close: Decimal, vwap: Decimal) -> Self {
        Self {
            open_time,
            timeframe,
            open: prev_close,
            high: prev_close,
            low: prev_close,
            close: prev_close,
            volume_base: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
            buy_quote_volume: Decimal::ZERO,
            sell_quote_volume: Decimal::ZERO,
            trade_count: 0,
            vwap,
            depth: DepthFeatures::default(),
        }
    }

    /// Net aggressive flow in quote units
    pub fn delta_usdt(&self) -> Decimal {
        self.buy_quote_volume - self.sell_quote_volume
    }

    /// Share of quote volume that was aggressive buying, 0 for empty candles
    pub fn imbalance(&self) -> f64 {
        let buy = self.buy_quote_volume.to_f64().unwrap_or(0.0);
        let sell = self.sell_quote_volume.to_f64().unwrap_or(0.0);
        buy / (buy + sell + 1e-12)
    }

    pub fn open_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.open_time).single()
    }

    /// Validate candle integrity (OHLCV invariants).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume_base >= Decimal::ZERO
            && self.quote_volume >= Decimal::ZERO
    }
}

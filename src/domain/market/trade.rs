use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single executed trade as recorded in the market files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<i64>,
    /// Raw exchange timestamp; unit (s or ms) is resolved during aggregation
    pub time: i64,
    pub price: Decimal,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    /// Maker was the buyer, so the aggressor sold
    pub is_buyer_maker: bool,
}

impl Trade {
    /// Trade with `quote_qty = price * qty`; `None` when the product overflows
    pub fn new(time: i64, price: Decimal, qty: Decimal, is_buyer_maker: bool) -> Option<Self> {
        Some(Self {
            id: None,
            time,
            price,
            qty,
            quote_qty: price.checked_mul(qty)?,
            is_buyer_maker,
        })
    }

    /// Aggressive buy (taker bought)
    pub fn is_taker_buy(&self) -> bool {
        !self.is_buyer_maker
    }
}

/// Unit of the raw trade timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
}

impl TimeUnit {
    pub fn to_millis(&self, raw: i64) -> i64 {
        match self {
            TimeUnit::Seconds => raw * 1000,
            TimeUnit::Millis => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_trade_derives_quote_qty() {
        let trade = Trade::new(1_700_000_000_000, dec!(0.5), dec!(200), false).unwrap();
        assert_eq!(trade.quote_qty, dec!(100.0));
        assert!(trade.is_taker_buy());
    }

    #[test]
    fn test_new_trade_rejects_overflowing_quote_qty() {
        assert!(Trade::new(1_700_000_000_000, Decimal::MAX, dec!(2), false).is_none());
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Seconds.to_millis(1_700_000_000), 1_700_000_000_000);
        assert_eq!(TimeUnit::Millis.to_millis(1_700_000_000_000), 1_700_000_000_000);
    }
}

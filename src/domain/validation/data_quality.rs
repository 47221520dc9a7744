use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::market::trade::Trade;
use rust_decimal::Decimal;
use tracing::warn;

/// Centralized validator for market data integrity.
///
/// Rejects data that is physically impossible (non-positive prices, negative
/// quantities, inverted candles).
pub struct StrictEventValidator;

impl StrictEventValidator {
    /// Validates a Trade. Returns true if valid, false otherwise.
    pub fn validate_trade(trade: &Trade) -> bool {
        if trade.price <= Decimal::ZERO {
            warn!(
                "Validation FAILED: trade {:?} at {} has non-positive price: {}",
                trade.id, trade.time, trade.price
            );
            return false;
        }
        if trade.qty < Decimal::ZERO || trade.quote_qty < Decimal::ZERO {
            warn!(
                "Validation FAILED: trade {:?} at {} has negative quantity: {}",
                trade.id, trade.time, trade.qty
            );
            return false;
        }
        if trade.time <= 0 {
            warn!(
                "Validation FAILED: trade {:?} has no usable timestamp",
                trade.id
            );
            return false;
        }
        true
    }

    /// Validates a Candle.
    pub fn validate_candle(candle: &FlowCandle) -> bool {
        if candle.open <= Decimal::ZERO
            || candle.high <= Decimal::ZERO
            || candle.low <= Decimal::ZERO
            || candle.close <= Decimal::ZERO
        {
            warn!(
                "Validation FAILED: candle at {} has non-positive price component(s)",
                candle.open_time
            );
            return false;
        }

        if !candle.is_valid() {
            warn!(
                "Validation FAILED: candle at {} violates OHLCV invariants (low {} high {})",
                candle.open_time, candle.low, candle.high
            );
            return false;
        }

        true
    }
}

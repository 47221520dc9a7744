//! Trade to candle resampling.
//!
//! Candle boundaries are aligned to the interval (1m candles open on minute
//! boundaries). Every interval between the first and the last trade gets a
//! candle; intervals without trades carry the previous close forward with
//! zero volume.

use crate::domain::errors::PipelineError;
use crate::domain::market::depth::DepthFeatures;
use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::trade::{TimeUnit, Trade};
use rust_decimal::Decimal;
use tracing::{debug, warn};

const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;
const SECONDS_THRESHOLD: i64 = 1_000_000_000;

/// Decides whether raw trade times are seconds or milliseconds from the
/// largest timestamp.
pub fn detect_time_unit(trades: &[Trade]) -> Result<TimeUnit, PipelineError> {
    let min = trades.iter().map(|t| t.time).min().unwrap_or(0);
    let max = trades.iter().map(|t| t.time).max().unwrap_or(0);

    if max > MILLIS_THRESHOLD {
        Ok(TimeUnit::Millis)
    } else if max > SECONDS_THRESHOLD {
        Ok(TimeUnit::Seconds)
    } else {
        Err(PipelineError::InvalidTimestamps { min, max })
    }
}

/// Running totals for one interval
struct Bucket {
    open_time: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume_base: Decimal,
    quote_volume: Decimal,
    buy_quote_volume: Decimal,
    sell_quote_volume: Decimal,
    trade_count: u64,
    /// Σ price · quote_qty, `None` once it overflows
    vwap_num: Option<Decimal>,
}

impl Bucket {
    fn new(open_time: i64, trade: &Trade) -> Self {
        let mut bucket = Self {
            open_time,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume_base: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
            buy_quote_volume: Decimal::ZERO,
            sell_quote_volume: Decimal::ZERO,
            trade_count: 0,
            vwap_num: Some(Decimal::ZERO),
        };
        // Sums starting from zero cannot overflow
        bucket.add(trade);
        bucket
    }

    /// Adds a trade. Returns `false` and leaves the bucket unchanged when a
    /// volume total would overflow.
    fn add(&mut self, trade: &Trade) -> bool {
        let Some(volume_base) = self.volume_base.checked_add(trade.qty) else {
            return false;
        };
        let Some(quote_volume) = self.quote_volume.checked_add(trade.quote_qty) else {
            return false;
        };
        let side = if trade.is_taker_buy() {
            &mut self.buy_quote_volume
        } else {
            &mut self.sell_quote_volume
        };
        let Some(side_volume) = side.checked_add(trade.quote_qty) else {
            return false;
        };
        *side = side_volume;

        if trade.price > self.high {
            self.high = trade.price;
        }
        if trade.price < self.low {
            self.low = trade.price;
        }
        self.close = trade.price;
        self.volume_base = volume_base;
        self.quote_volume = quote_volume;
        self.trade_count += 1;
        self.vwap_num = self.vwap_num.and_then(|num| {
            trade
                .price
                .checked_mul(trade.quote_qty)
                .and_then(|pq| num.checked_add(pq))
        });
        true
    }

    /// VWAP, or `None` when no quote volume traded or the numerator overflowed
    fn vwap(&self) -> Option<Decimal> {
        if self.quote_volume.is_zero() {
            return None;
        }
        self.vwap_num?.checked_div(self.quote_volume)
    }

    fn into_candle(self, timeframe: Timeframe, vwap: Decimal) -> FlowCandle {
        FlowCandle {
            open_time: self.open_time,
            timeframe,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume_base: self.volume_base,
            quote_volume: self.quote_volume,
            buy_quote_volume: self.buy_quote_volume,
            sell_quote_volume: self.sell_quote_volume,
            trade_count: self.trade_count,
            vwap,
            depth: DepthFeatures::default(),
        }
    }
}

/// Resamples trades into fixed-interval [`FlowCandle`]s.
#[derive(Debug, Clone, Copy)]
pub struct CandleBuilder {
    timeframe: Timeframe,
}

impl CandleBuilder {
    pub fn new(timeframe: Timeframe) -> Self {
        Self { timeframe }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Builds a gap-free candle series. Empty input yields an empty series.
    pub fn build(&self, trades: &[Trade]) -> Result<Vec<FlowCandle>, PipelineError> {
        if trades.is_empty() {
            return Ok(Vec::new());
        }
        let unit = detect_time_unit(trades)?;

        let mut ordered: Vec<(i64, &Trade)> = trades
            .iter()
            .map(|t| (unit.to_millis(t.time), t))
            .collect();
        ordered.sort_by_key(|(ms, _)| *ms);

        // Trades grouped into consecutive non-empty buckets
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut overflowed = 0usize;
        for (ms, trade) in ordered {
            let start = self.timeframe.period_start(ms);
            match buckets.last_mut() {
                Some(bucket) if bucket.open_time == start => {
                    if !bucket.add(trade) {
                        overflowed += 1;
                    }
                }
                _ => buckets.push(Bucket::new(start, trade)),
            }
        }
        if overflowed > 0 {
            warn!("Skipped {} trades whose volume overflowed their candle", overflowed);
        }

        let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
            return Ok(Vec::new());
        };
        let first_start = first.open_time;
        let total = self.timeframe.periods_between(first_start, last.open_time);
        let step = self.timeframe.to_millis();

        let mut candles = Vec::with_capacity(total);
        let mut pending = buckets.into_iter().peekable();
        let mut last_close: Option<Decimal> = None;
        let mut last_vwap: Option<Decimal> = None;

        for idx in 0..total {
            let open_time = first_start + idx as i64 * step;
            let has_trades = pending.peek().is_some_and(|b| b.open_time == open_time);

            let candle = if has_trades {
                let Some(bucket) = pending.next() else {
                    break;
                };
                let vwap = match bucket.vwap() {
                    Some(v) => {
                        last_vwap = Some(v);
                        v
                    }
                    None => last_vwap.unwrap_or(bucket.close),
                };
                bucket.into_candle(self.timeframe, vwap)
            } else {
                // The first interval always holds a trade, so a close exists here
                let close = last_close.unwrap_or_default();
                FlowCandle::flat(open_time, self.timeframe, close, last_vwap.unwrap_or(close))
            };

            last_close = Some(candle.close);
            candles.push(candle);
        }

        debug!(
            "Built {} {} candles from {} trades",
            candles.len(),
            self.timeframe,
            trades.len()
        );
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // 2024-01-01 00:00:00 UTC
    const BASE: i64 = 1704067200000;

    fn trade(offset_ms: i64, price: Decimal, qty: Decimal, buyer_maker: bool) -> Trade {
        Trade::new(BASE + offset_ms, price, qty, buyer_maker).unwrap()
    }

    #[test]
    fn test_ohlc_and_flow_features() {
        let trades = vec![
            trade(1_000, dec!(10), dec!(1), false),
            trade(20_000, dec!(12), dec!(1), true),
            trade(40_000, dec!(9), dec!(2), false),
            trade(59_999, dec!(11), dec!(1), true),
        ];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();

        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.open_time, BASE);
        assert_eq!((c.open, c.high, c.low, c.close), (dec!(10), dec!(12), dec!(9), dec!(11)));
        assert_eq!(c.volume_base, dec!(5));
        assert_eq!(c.quote_volume, dec!(51));
        assert_eq!(c.buy_quote_volume, dec!(28));
        assert_eq!(c.sell_quote_volume, dec!(23));
        assert_eq!(c.delta_usdt(), dec!(5));
        assert_eq!(c.trade_count, 4);
        // (10*10 + 12*12 + 9*18 + 11*11) / 51
        let expected_vwap = dec!(527) / dec!(51);
        assert_eq!(c.vwap, expected_vwap);
        assert!((c.imbalance() - 28.0 / 51.0).abs() < 1e-9);
    }

    #[test]
    fn test_gaps_are_forward_filled() {
        let trades = vec![
            trade(0, dec!(10), dec!(1), false),
            trade(30_000, dec!(11), dec!(1), false),
            trade(3 * 60_000 + 5, dec!(12), dec!(1), true),
        ];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();

        assert_eq!(candles.len(), 4);
        for gap in &candles[1..3] {
            assert_eq!(gap.trade_count, 0);
            assert_eq!(gap.close, dec!(11));
            assert_eq!(gap.open, dec!(11));
            assert_eq!(gap.high, dec!(11));
            assert_eq!(gap.low, dec!(11));
            assert_eq!(gap.quote_volume, Decimal::ZERO);
            // vwap carries the last traded vwap, not the close
            assert_eq!(gap.vwap, candles[0].vwap);
            assert_eq!(gap.imbalance(), 0.0);
        }
        assert_eq!(candles[3].open_time, BASE + 3 * 60_000);
        assert_eq!(candles[3].open, dec!(12));
    }

    #[test]
    fn test_zero_quote_volume_uses_previous_vwap() {
        let trades = vec![
            trade(0, dec!(10), dec!(1), false),
            trade(60_000, dec!(20), dec!(0), false),
        ];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();
        assert_eq!(candles[1].vwap, dec!(10));
        assert_eq!(candles[1].close, dec!(20));
    }

    #[test]
    fn test_first_zero_volume_vwap_falls_back_to_close() {
        let trades = vec![trade(0, dec!(7), dec!(0), false)];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();
        assert_eq!(candles[0].vwap, dec!(7));
    }

    #[test]
    fn test_second_timestamps_are_detected() {
        let trades = vec![
            Trade::new(BASE / 1000, dec!(1), dec!(1), false).unwrap(),
            Trade::new(BASE / 1000 + 61, dec!(2), dec!(1), false).unwrap(),
        ];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, BASE);
        assert_eq!(candles[1].open_time, BASE + 60_000);
    }

    #[test]
    fn test_invalid_timestamps_rejected() {
        let trades = vec![Trade::new(12345, dec!(1), dec!(1), false).unwrap()];

        assert!(matches!(
            CandleBuilder::new(Timeframe::OneMin).build(&trades),
            Err(PipelineError::InvalidTimestamps { min: 12345, max: 12345 })
        ));
    }

    #[test]
    fn test_empty_trades() {
        assert!(CandleBuilder::new(Timeframe::OneMin).build(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_five_minute_interval() {
        let trades = vec![
            trade(0, dec!(1), dec!(1), false),
            trade(4 * 60_000, dec!(2), dec!(1), false),
            trade(5 * 60_000, dec!(3), dec!(1), false),
        ];

        let candles = CandleBuilder::new(Timeframe::FiveMin).build(&trades).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].trade_count, 2);
        assert_eq!(candles[0].close, dec!(2));
        assert_eq!(candles[1].open, dec!(3));
    }

    fn raw_trade(offset_ms: i64, price: Decimal, quote_qty: Decimal) -> Trade {
        Trade {
            id: None,
            time: BASE + offset_ms,
            price,
            qty: dec!(1),
            quote_qty,
            is_buyer_maker: false,
        }
    }

    #[test]
    fn test_vwap_overflow_falls_back_to_close() {
        let big = Decimal::from(10i64.pow(15));
        let trades = vec![raw_trade(0, big, big)];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].quote_volume, big);
        assert_eq!(candles[0].vwap, big);
    }

    #[test]
    fn test_volume_overflow_skips_trade() {
        let trades = vec![
            raw_trade(0, dec!(2), Decimal::MAX),
            raw_trade(1_000, dec!(5), Decimal::MAX),
            raw_trade(2_000, dec!(3), Decimal::ZERO),
        ];

        let candles = CandleBuilder::new(Timeframe::OneMin).build(&trades).unwrap();
        let c = &candles[0];
        assert_eq!(c.trade_count, 2);
        assert_eq!(c.quote_volume, Decimal::MAX);
        assert_eq!(c.high, dec!(3));
        assert_eq!(c.close, dec!(3));
        // price · quote_qty overflowed, so vwap is the close
        assert_eq!(c.vwap, dec!(3));
    }
}

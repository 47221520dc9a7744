use crate::domain::market::depth::{DepthFeatures, DepthRecord};
use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::market::timeframe::Timeframe;
use std::collections::HashMap;
use tracing::{debug, info};

/// Attaches depth features to candles.
///
/// Records are bucketed by `timeframe` and the first record of each bucket
/// wins. A candle takes the record of its own bucket, otherwise the last
/// record matched to an earlier candle, otherwise zeros. Records for buckets
/// outside the candle range are ignored.
pub fn merge_depth(candles: &mut [FlowCandle], records: &[DepthRecord], timeframe: Timeframe) {
    if candles.is_empty() {
        return;
    }
    if records.is_empty() {
        info!("No depth data found, depth features set to zero");
        for candle in candles.iter_mut() {
            candle.depth = DepthFeatures::default();
        }
        return;
    }

    let mut by_bucket: HashMap<i64, DepthFeatures> = HashMap::with_capacity(records.len());
    for record in records {
        by_bucket
            .entry(timeframe.period_start(record.timestamp))
            .or_insert(record.features);
    }

    let mut last: Option<DepthFeatures> = None;
    let mut matched = 0usize;
    for candle in candles.iter_mut() {
        if let Some(features) = by_bucket.get(&candle.open_time) {
            last = Some(*features);
            matched += 1;
        }
        candle.depth = last.unwrap_or_default();
    }

    debug!(
        "Depth merge: {} records, {} buckets, {}/{} candles matched",
        records.len(),
        by_bucket.len(),
        matched,
        candles.len()
    );
}

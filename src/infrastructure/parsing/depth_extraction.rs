use super::{first_present, json_f64, json_i64};
use crate::domain::market::depth::{DepthFeatures, DepthRecord};
use serde_json::{Map, Value};

const TIMESTAMP_KEYS: &[&str] = &["openTime", "timestamp", "time", "ts"];
const SNAPSHOT_TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts", "openTime"];

/// Extracts depth observations from market documents.
///
/// Three shapes are recognised, in priority order per document:
/// 1. a `candles` array of per-interval liquidity summaries,
/// 2. a `tickMarkers` array of book snapshots,
/// 3. any array whose first element is an object with `bids` and `asks`.
pub fn extract_depth(markets: &[Value]) -> Vec<DepthRecord> {
    let mut records = Vec::new();
    for market in markets {
        let Value::Object(obj) = market else {
            continue;
        };

        if let Some(candles) = obj.get("candles").and_then(Value::as_array) {
            records.extend(candles.iter().filter_map(parse_liquidity_summary));
        } else if let Some(markers) = obj.get("tickMarkers").and_then(Value::as_array) {
            records.extend(markers.iter().filter_map(parse_snapshot));
        } else {
            for value in obj.values() {
                let Some(items) = value.as_array() else {
                    continue;
                };
                let looks_like_book = items
                    .first()
                    .and_then(Value::as_object)
                    .is_some_and(|o| o.contains_key("bids") && o.contains_key("asks"));
                if looks_like_book {
                    records.extend(items.iter().filter_map(parse_snapshot));
                }
            }
        }
    }
    records
}

/// `{openTime, bidLiquidity, askLiquidity, orderbookImbalance, spread, mid_price}`
fn parse_liquidity_summary(raw: &Value) -> Option<DepthRecord> {
    let obj = raw.as_object()?;
    let timestamp = first_present(obj, TIMESTAMP_KEYS).and_then(json_i64)?;
    let field = |key: &str| obj.get(key).and_then(json_f64).unwrap_or(0.0);

    Some(DepthRecord {
        timestamp,
        features: DepthFeatures {
            bid_liq: field("bidLiquidity"),
            ask_liq: field("askLiquidity"),
            depth_imbalance: field("orderbookImbalance"),
            spread: field("spread"),
            mid_price: field("mid_price"),
        },
    })
}

/// A book snapshot with `bids`/`asks` inline or nested under `depth`/`orderbook`
fn parse_snapshot(raw: &Value) -> Option<DepthRecord> {
    let obj = raw.as_object()?;
    let timestamp = first_present(obj, SNAPSHOT_TIMESTAMP_KEYS).and_then(json_i64)?;
    let nested = obj
        .get("depth")
        .or_else(|| obj.get("orderbook"))
        .and_then(Value::as_object);

    let bids = book_side(obj, nested, "bids");
    let asks = book_side(obj, nested, "asks");
    let features = DepthFeatures::from_levels(&bids, &asks)?;

    Some(DepthRecord {
        timestamp,
        features,
    })
}

fn book_side(
    obj: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
    key: &str,
) -> Vec<(f64, f64)> {
    let inline = obj.get(key).and_then(Value::as_array).filter(|a| !a.is_empty());
    let levels = inline.or_else(|| nested.and_then(|n| n.get(key)).and_then(Value::as_array));
    levels
        .map(|levels| levels.iter().map_while(parse_level).collect())
        .unwrap_or_default()
}

/// `[price, qty]` or `{"price": .., "qty": ..}`
fn parse_level(raw: &Value) -> Option<(f64, f64)> {
    match raw {
        Value::Array(pair) if pair.len() >= 2 => Some((json_f64(&pair[0])?, json_f64(&pair[1])?)),
        Value::Object(level) => Some((
            json_f64(level.get("price")?)?,
            json_f64(level.get("qty")?)?,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_liquidity_summaries() {
        let markets = vec![json!({"candles": [
            {
                "openTime": 1704067200000i64,
                "bidLiquidity": 10.0,
                "askLiquidity": "5",
                "orderbookImbalance": 0.3,
                "spread": "0.02",
                "mid_price": 0.615
            },
            {"timestamp": 1704067260000i64, "bidLiquidity": 2.0, "spread": "n/a"},
            {"bidLiquidity": 1.0}
        ]})];

        let records = extract_depth(&markets);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 1704067200000);
        assert_eq!(
            records[0].features,
            DepthFeatures {
                bid_liq: 10.0,
                ask_liq: 5.0,
                depth_imbalance: 0.3,
                spread: 0.02,
                mid_price: 0.615,
            }
        );
        // Missing or unparseable fields read as zero
        assert_eq!(records[1].features.bid_liq, 2.0);
        assert_eq!(records[1].features.ask_liq, 0.0);
        assert_eq!(records[1].features.spread, 0.0);
        assert_eq!(records[1].features.mid_price, 0.0);
    }

    #[test]
    fn test_tick_markers_with_nested_book() {
        let markets = vec![json!({"tickMarkers": [
            {
                "timestamp": 1704067200000i64,
                "depth": {"bids": [["99", "2"]], "asks": [["101", "3"]]}
            },
            {
                "timestamp": 1704067260000i64,
                "bids": [{"price": 100.0, "qty": 1.0}],
                "asks": [{"price": 100.5, "qty": 1.0}]
            }
        ]})];

        let records = extract_depth(&markets);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].features.spread, 2.0);
        assert_eq!(records[0].features.mid_price, 100.0);
        assert_eq!(records[1].features.spread, 0.5);
    }

    #[test]
    fn test_tick_markers_with_orderbook_nesting() {
        let markets = vec![json!({"tickMarkers": [
            {
                "ts": 1704067200000i64,
                "orderbook": {
                    "bids": [[10.0, 3.0], [9.9, 1.0]],
                    "asks": [[10.2, 1.0], [10.3, 1.0]]
                }
            }
        ]})];

        let records = extract_depth(&markets);

        assert_eq!(records.len(), 1);
        let features = records[0].features;
        assert_eq!(features.bid_liq, 4.0);
        assert_eq!(features.ask_liq, 2.0);
        assert!((features.spread - 0.2).abs() < 1e-9);
        assert!((features.mid_price - 10.1).abs() < 1e-9);
        assert!((features.depth_imbalance - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_scans_book_arrays() {
        let markets = vec![json!({
            "trades": [],
            "depths": [{"time": 1704067200000i64, "bids": [[1.0, 4.0]], "asks": [[1.1, 1.0]]}]
        })];

        let records = extract_depth(&markets);
        assert_eq!(records.len(), 1);
        assert!((records[0].features.depth_imbalance - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_candles_take_priority_over_markers() {
        let markets = vec![json!({
            "candles": [],
            "tickMarkers": [
                {"timestamp": 1704067200000i64, "bids": [[1.0, 1.0]], "asks": [[1.1, 1.0]]}
            ]
        })];

        assert!(extract_depth(&markets).is_empty());
    }
}

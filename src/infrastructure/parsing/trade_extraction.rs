use super::{first_non_empty_array, first_present, json_decimal, json_i64, json_truthy};
use crate::domain::market::trade::Trade;
use crate::domain::validation::data_quality::StrictEventValidator;
use serde_json::Value;
use tracing::debug;

/// Keys under which a market object may keep its trade list
pub const TRADE_LIST_KEYS: &[&str] = &["trades", "trade", "Trades", "aggTrades", "aggrTrades"];

const ID_KEYS: &[&str] = &["id", "tradeId"];
const TIME_KEYS: &[&str] = &["time", "timestamp", "ts"];

/// Extracts trades from market documents, sorted by time.
///
/// Malformed trades are skipped; documents without trades contribute nothing.
pub fn extract_trades(markets: &[Value]) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut skipped = 0usize;

    for market in markets {
        let list = match market {
            Value::Object(obj) => first_non_empty_array(obj, TRADE_LIST_KEYS),
            Value::Array(items) => Some(items),
            _ => None,
        };
        let Some(list) = list else {
            continue;
        };

        for raw in list {
            match parse_trade(raw) {
                Some(trade) if StrictEventValidator::validate_trade(&trade) => trades.push(trade),
                _ => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} malformed trades", skipped);
    }

    trades.sort_by_key(|t| t.time);
    trades
}

/// Parses one trade object. Returns `None` when price or qty is unusable or
/// the derived quote quantity overflows.
pub fn parse_trade(raw: &Value) -> Option<Trade> {
    let obj = raw.as_object()?;

    let price = json_decimal(obj.get("price")?)?;
    let qty = json_decimal(obj.get("qty")?)?;
    // A zero or negative time under one key falls through to the next
    let time = TIME_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(json_i64)
        .find(|t| *t > 0)
        .unwrap_or(0);
    let is_buyer_maker = obj.get("isBuyerMaker").is_some_and(json_truthy);

    let mut trade = match obj.get("quoteQty").filter(|v| !v.is_null()) {
        Some(v) => Trade {
            id: None,
            time,
            price,
            qty,
            quote_qty: json_decimal(v)?,
            is_buyer_maker,
        },
        None => Trade::new(time, price, qty, is_buyer_maker)?,
    };
    trade.id = first_present(obj, ID_KEYS).and_then(json_i64);
    Some(trade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_extract_from_object_and_bare_list() {
        let markets = vec![
            json!({"aggTrades": [
                {
                    "id": 2,
                    "price": "0.62",
                    "qty": "100",
                    "time": 1704067260000i64,
                    "isBuyerMaker": true
                }
            ]}),
            json!([
                {
                    "tradeId": 1,
                    "price": 0.61,
                    "qty": 50,
                    "quoteQty": 30.5,
                    "timestamp": 1704067200000i64,
                    "isBuyerMaker": false
                }
            ]),
        ];

        let trades = extract_trades(&markets);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id, Some(1));
        assert_eq!(trades[0].quote_qty, dec!(30.5));
        assert!(!trades[0].is_buyer_maker);
        assert_eq!(trades[1].quote_qty, dec!(62.00));
        assert!(trades[1].is_buyer_maker);
    }

    #[test]
    fn test_first_non_empty_list_wins() {
        let markets = vec![json!({
            "trades": [],
            "Trades": [{"price": "1", "qty": "1", "ts": 1704067200000i64}]
        })];

        assert_eq!(extract_trades(&markets).len(), 1);
    }

    #[test]
    fn test_malformed_trades_are_skipped() {
        let markets = vec![json!({"trades": [
            "not an object",
            {"price": "abc", "qty": "1", "time": 1704067200000i64},
            {"qty": "1", "time": 1704067200000i64},
            {"price": "1", "qty": "1"},
            {"price": "1", "qty": "2", "time": 1704067200000i64}
        ]})];

        let trades = extract_trades(&markets);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, dec!(2));
    }

    #[test]
    fn test_trades_sorted_by_time() {
        let markets = vec![json!({"trades": [
            {"price": "3", "qty": "1", "time": 1704067300000i64},
            {"price": "1", "qty": "1", "time": 1704067100000i64},
            {"price": "2", "qty": "1", "time": 1704067200000i64}
        ]})];

        let prices: Vec<_> = extract_trades(&markets).iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![dec!(1), dec!(2), dec!(3)]);
    }

    #[test]
    fn test_documents_without_trades() {
        let markets = vec![json!({"depth": []}), json!(42), json!({"trades": null})];
        assert!(extract_trades(&markets).is_empty());
    }

    #[test]
    fn test_overflowing_quote_qty_is_skipped() {
        let markets = vec![json!({"trades": [
            {"price": "1e20", "qty": "1e20", "time": 1704067200000i64},
            {"price": "2", "qty": "3", "time": 1704067200000i64}
        ]})];

        let trades = extract_trades(&markets);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quote_qty, dec!(6));
    }

    #[test]
    fn test_zero_time_falls_through_to_next_key() {
        let markets = vec![json!({"trades": [
            {"price": "1", "qty": "1", "time": 0, "timestamp": 1704067200000i64},
            {"price": "1", "qty": "1", "time": "0", "ts": 1704067260000i64}
        ]})];

        let times: Vec<_> = extract_trades(&markets).iter().map(|t| t.time).collect();
        assert_eq!(times, vec![1704067200000, 1704067260000]);
    }

    #[test]
    fn test_string_false_is_not_buyer_maker() {
        let trade = parse_trade(&json!({
            "price": "1", "qty": "1", "time": 1704067200000i64, "isBuyerMaker": "false"
        }))
        .unwrap();
        assert!(!trade.is_buyer_maker);
    }
}

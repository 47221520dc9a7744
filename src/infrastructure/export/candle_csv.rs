use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::ml::feature_registry::FeatureColumn;
use crate::domain::ml::labels::{FutureRanges, label_names};
use anyhow::{Context, Result};
use std::io::Write;

/// Writes candles, one row each, with every feature column and, when given,
/// the future-range labels (empty cells where a label is missing).
pub fn write_candles<W: Write>(
    writer: W,
    candles: &[FlowCandle],
    labels: Option<(&[Option<FutureRanges>], usize)>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = vec!["open_time".to_string()];
    header.extend(FeatureColumn::all().iter().map(|c| c.name().to_string()));
    if let Some((_, n_future)) = labels {
        header.extend(label_names(n_future));
    }
    wtr.write_record(&header).context("Failed to write CSV header")?;

    for (i, candle) in candles.iter().enumerate() {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        row.push(
            candle
                .open_datetime()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| candle.open_time.to_string()),
        );
        row.extend(FeatureColumn::all().iter().map(|c| c.value(candle).to_string()));

        if let Some((labels, n_future)) = labels {
            match labels.get(i).and_then(Option::as_ref) {
                Some(ranges) => row.extend(ranges.to_vec().iter().map(f64::to_string)),
                None => row.extend(std::iter::repeat_n(String::new(), 2 * n_future)),
            }
        }
        wtr.write_record(&row)
            .with_context(|| format!("Failed to write candle row {}", i))?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use crate::domain::ml::labels::build_future_ranges;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_candles_with_labels() {
        let candles = vec![
            FlowCandle::flat(1704067200000, Timeframe::OneMin, dec!(1.0), dec!(1.0)),
            FlowCandle::flat(1704067260000, Timeframe::OneMin, dec!(1.0), dec!(1.0)),
        ];
        let labels = build_future_ranges(&candles, 1);

        let mut out = Vec::new();
        write_candles(&mut out, &candles, Some((&labels, 1))).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("open_time,open,high,low,close"));
        assert!(lines[0].ends_with("future_up_1,future_down_1"));
        assert!(lines[1].starts_with("2024-01-01T00:00:00+00:00"));
        assert!(lines[2].ends_with(",,"));
    }
}

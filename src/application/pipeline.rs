use crate::application::aggregation::{CandleBuilder, merge_depth};
use crate::domain::errors::PipelineError;
use crate::domain::market::flow_candle::FlowCandle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::validation::data_quality::StrictEventValidator;
use crate::infrastructure::parsing::depth_extraction::extract_depth;
use crate::infrastructure::parsing::trade_extraction::extract_trades;
use crate::infrastructure::persistence::market_files::MarketFileStore;
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

/// Candles built for one symbol, with ingestion counts
#[derive(Debug, Clone)]
pub struct CandleSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<FlowCandle>,
    pub file_count: usize,
    pub trade_count: usize,
}

impl CandleSeries {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Market files → trades → candles (+ depth features)
#[derive(Debug, Clone)]
pub struct MarketPipeline {
    store: MarketFileStore,
    builder: CandleBuilder,
}

impl MarketPipeline {
    pub fn new(store: MarketFileStore, timeframe: Timeframe) -> Self {
        Self {
            store,
            builder: CandleBuilder::new(timeframe),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.builder.timeframe()
    }

    /// Loads the symbol's files and builds a depth-enriched candle series.
    pub fn load(&self, symbol: &str) -> Result<CandleSeries> {
        let documents = self
            .store
            .load(symbol)
            .with_context(|| format!("Failed to load market files for {}", symbol))?;
        info!("Loaded JSON files: {}", documents.len());

        let series = self.build_series(symbol, &documents, true)?;
        Ok(series)
    }

    /// Builds candles from already loaded documents.
    ///
    /// Fails when the documents hold no trades or produce no candles.
    pub fn build_series(
        &self,
        symbol: &str,
        documents: &[Value],
        with_depth: bool,
    ) -> Result<CandleSeries, PipelineError> {
        let trades = extract_trades(documents);
        info!("Total trades: {}", trades.len());
        if trades.is_empty() {
            return Err(PipelineError::NoTrades {
                symbol: symbol.to_string(),
            });
        }

        let mut candles = self.builder.build(&trades)?;
        if candles.is_empty() {
            return Err(PipelineError::NoCandles {
                symbol: symbol.to_string(),
            });
        }

        let invalid = candles
            .iter()
            .filter(|c| !StrictEventValidator::validate_candle(c))
            .count();
        if invalid > 0 {
            warn!("{} of {} candles failed validation", invalid, candles.len());
        }

        if with_depth {
            let records = extract_depth(documents);
            merge_depth(&mut candles, &records, self.timeframe());
        }

        info!("Candles: {} x {}", candles.len(), self.timeframe());
        Ok(CandleSeries {
            symbol: symbol.to_string(),
            timeframe: self.timeframe(),
            candles,
            file_count: documents.len(),
            trade_count: trades.len(),
        })
    }
}

// Market data domain
pub mod depth;
pub mod flow_candle;
pub mod timeframe;
pub mod trade;

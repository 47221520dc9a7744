pub mod candle_builder;
pub mod depth_merge;

pub use candle_builder::{CandleBuilder, detect_time_unit};
pub use depth_merge::merge_depth;

pub mod aggregation;
pub mod ml;
pub mod pipeline;

pub mod dataset;
pub mod feature_registry;
pub mod labels;
pub mod model;
pub mod scaler;

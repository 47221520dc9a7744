pub mod market_files;
pub mod model_store;

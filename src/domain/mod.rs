// Market data domain
pub mod market;

// Labels, features, scalers and datasets
pub mod ml;

// Data integrity checks
pub mod validation;

// Domain-specific error types
pub mod errors;

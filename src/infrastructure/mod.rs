pub mod export;
pub mod parsing;
pub mod persistence;

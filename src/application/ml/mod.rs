pub mod forest_forecaster;
pub mod lstm_forecaster;
pub mod predictor;
pub mod trainer;

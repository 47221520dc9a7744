pub mod candle_csv;

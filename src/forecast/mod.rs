/// Прогноз: генерация входов, предсказание, агрегация

pub mod aggregator;
pub mod generator;
pub mod predictor;

pub use aggregator::{format_group, format_report, ForecastAggregator, HistoryOverlay};
pub use generator::{FutureInputGenerator, MAX_HORIZON_DAYS};
pub use predictor::{Predictions, Predictor};

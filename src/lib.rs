//! Weather Forecast - прогноз погоды по дням и времени суток

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod types;

pub use config::ForecastConfig;
pub use error::{ForecastError, Result};
pub use pipeline::{ForecastPipeline, RunOptions};
pub use types::*;

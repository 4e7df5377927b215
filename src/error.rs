//! Ошибки прогнозирования

use std::path::PathBuf;

use crate::types::TargetParameter;

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Data file not found: {}", .0.display())]
    DataFileNotFound(PathBuf),

    #[error("Invalid city name: {0:?}")]
    InvalidCity(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source has no Timestamp column")]
    MissingTimestampColumn,

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Column {0} is missing from the source data")]
    MissingColumn(TargetParameter),

    #[error("Not enough rows to train {target}: {rows}")]
    InsufficientData { target: TargetParameter, rows: usize },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Linfa error: {0}")]
    Linfa(#[from] linfa::Error),

    #[error("Invalid time slot table: {0}")]
    InvalidTimeSlotTable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

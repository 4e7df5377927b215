//! Настройки прогноза

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::forecast::MAX_HORIZON_DAYS;
use crate::models::ForestParams;
use crate::preprocessing::TimeSlotTable;
use crate::types::TargetParameter;

pub const CONFIG_ENV: &str = "WEATHER_FORECAST_CONFIG";
pub const DATA_DIR_ENV: &str = "WEATHER_DATA_DIR";
pub const LISTEN_ADDR_ENV: &str = "WEATHER_FORECAST_ADDR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_min_training_rows")]
    pub min_training_rows: usize,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Верхняя граница горизонта для запросов и CLI
    #[serde(default = "default_max_horizon_days")]
    pub max_horizon_days: u32,
    #[serde(default = "default_history_tail")]
    pub history_tail: usize,
    /// Каталог для CSV-оверлеев история/прогноз, None - не писать
    #[serde(default)]
    pub overlay_dir: Option<PathBuf>,
    #[serde(default)]
    pub parallel_training: bool,
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetParameter>,
    #[serde(default)]
    pub time_slots: TimeSlotTable,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_holdout_fraction() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_n_estimators() -> usize { 100 }
fn default_min_samples_split() -> usize { 2 }
fn default_min_samples_leaf() -> usize { 1 }
fn default_min_training_rows() -> usize { 10 }
fn default_horizon_days() -> u32 { 5 }
fn default_max_horizon_days() -> u32 { 30 }
fn default_history_tail() -> usize { 100 }
fn default_targets() -> Vec<TargetParameter> { TargetParameter::ALL.to_vec() }
fn default_listen_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8000)) }

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            holdout_fraction: default_holdout_fraction(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            min_training_rows: default_min_training_rows(),
            horizon_days: default_horizon_days(),
            max_horizon_days: default_max_horizon_days(),
            history_tail: default_history_tail(),
            overlay_dir: None,
            parallel_training: false,
            targets: default_targets(),
            time_slots: TimeSlotTable::default(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl ForecastConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ForecastConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Файл из `WEATHER_FORECAST_CONFIG` (или значения по умолчанию),
    /// затем переопределения из окружения.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var(LISTEN_ADDR_ENV) {
            config.listen_addr = addr
                .parse()
                .map_err(|e| ForecastError::InvalidConfig(format!("{}={}: {}", LISTEN_ADDR_ENV, addr, e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "holdout_fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidConfig("n_estimators must be positive".to_string()));
        }
        if self.horizon_days == 0 {
            return Err(ForecastError::InvalidConfig("horizon_days must be positive".to_string()));
        }
        if self.max_horizon_days == 0 || self.max_horizon_days > MAX_HORIZON_DAYS {
            return Err(ForecastError::InvalidConfig(format!(
                "max_horizon_days must be in 1..={}, got {}",
                MAX_HORIZON_DAYS, self.max_horizon_days
            )));
        }
        if self.horizon_days > self.max_horizon_days {
            return Err(ForecastError::InvalidConfig(format!(
                "horizon_days {} exceeds max_horizon_days {}",
                self.horizon_days, self.max_horizon_days
            )));
        }
        self.check_horizon(self.horizon_days)?;
        if self.targets.is_empty() {
            return Err(ForecastError::InvalidConfig("no targets configured".to_string()));
        }
        Ok(())
    }

    /// Горизонт запроса: от одного дня до `max_horizon_days`
    pub fn check_horizon(&self, horizon: u32) -> Result<()> {
        if horizon == 0 {
            return Err(ForecastError::InvalidConfig("horizon must be at least one day".to_string()));
        }
        if horizon > self.max_horizon_days {
            return Err(ForecastError::InvalidConfig(format!(
                "horizon {} exceeds the limit of {} days",
                horizon, self.max_horizon_days
            )));
        }
        Ok(())
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            seed: self.seed,
        }
    }
}

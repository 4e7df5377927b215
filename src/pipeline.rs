//! Полный прогон прогноза для одного города

use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::config::ForecastConfig;
use crate::data;
use crate::error::{ForecastError, Result};
use crate::forecast::{format_report, ForecastAggregator, FutureInputGenerator, HistoryOverlay, Predictor};
use crate::models::{ModelTrainer, TrainingOutcome};
use crate::types::{ForecastReport, TargetParameter, WeatherDataset, WeatherSummary};

/// Параметры одного запуска поверх конфигурации
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub horizon: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub targets: Option<Vec<TargetParameter>>,
}

pub struct ForecastPipeline {
    config: ForecastConfig,
    trainer: ModelTrainer,
}

impl ForecastPipeline {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let trainer = ModelTrainer::new(
            config.forest_params(),
            config.holdout_fraction,
            config.min_training_rows,
        )?;
        Ok(Self { config, trainer })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Загрузка `<data_dir>/<city>.csv` и последовательный прогон
    pub fn run(&self, city: &str, options: &RunOptions) -> Result<ForecastReport> {
        self.horizon(options)?;
        let dataset = data::load_city(&self.config.data_dir, city)?;
        self.run_dataset(&dataset, options)
    }

    pub fn run_dataset(&self, dataset: &WeatherDataset, options: &RunOptions) -> Result<ForecastReport> {
        let horizon = self.horizon(options)?;
        let targets = self.targets(options);
        let outcome = self.trainer.train_all(dataset, &self.config.time_slots, &targets);
        self.finish(dataset, outcome, horizon, options)
    }

    /// Как `run`, но параметры обучаются параллельно
    pub async fn run_concurrent(&self, city: &str, options: &RunOptions) -> Result<ForecastReport> {
        let horizon = self.horizon(options)?;
        let data_dir = self.config.data_dir.clone();
        let city_name = city.to_string();
        let dataset = tokio::task::spawn_blocking(move || data::load_city(&data_dir, &city_name))
            .await
            .map_err(|e| ForecastError::Model(format!("loading task failed: {}", e)))??;
        let dataset = Arc::new(dataset);

        let targets = self.targets(options);
        let outcome = self
            .trainer
            .train_all_concurrent(
                Arc::clone(&dataset),
                Arc::new(self.config.time_slots.clone()),
                &targets,
            )
            .await;
        self.finish(&dataset, outcome, horizon, options)
    }

    /// Прогон в режиме из конфигурации: параллельное обучение при
    /// `parallel_training`, иначе `run` в blocking-задаче
    pub async fn run_configured(self: Arc<Self>, city: String, options: RunOptions) -> Result<ForecastReport> {
        if self.config.parallel_training {
            return self.run_concurrent(&city, &options).await;
        }
        tokio::task::spawn_blocking(move || self.run(&city, &options))
            .await
            .map_err(|e| ForecastError::Model(format!("forecast task failed: {}", e)))?
    }

    /// Сводка по наблюдениям города
    pub fn summary(&self, city: &str) -> Result<WeatherSummary> {
        Ok(data::load_city(&self.config.data_dir, city)?.summary())
    }

    fn targets(&self, options: &RunOptions) -> Vec<TargetParameter> {
        options
            .targets
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.config.targets.clone())
    }

    fn horizon(&self, options: &RunOptions) -> Result<u32> {
        let horizon = options.horizon.unwrap_or(self.config.horizon_days);
        self.config.check_horizon(horizon)?;
        Ok(horizon)
    }

    fn finish(
        &self,
        dataset: &WeatherDataset,
        mut outcome: TrainingOutcome,
        horizon: u32,
        options: &RunOptions,
    ) -> Result<ForecastReport> {
        let start_date = match options.start_date {
            Some(date) => date,
            None => default_start_date(dataset)?,
        };

        let table = &self.config.time_slots;
        let inputs = FutureInputGenerator::new(table)
            .with_max_horizon(self.config.max_horizon_days)
            .generate(start_date, horizon)?;
        let predictions = Predictor::predict_all(&outcome.models, &inputs);
        for failed in &predictions.failed {
            outcome.models.remove(&failed.target);
        }
        outcome.skipped.extend(predictions.failed);
        outcome.skipped.sort_by_key(|s| s.target);

        let groups = ForecastAggregator::new(table).aggregate(&predictions.rows);
        let lines = format_report(&groups);

        tracing::info!(
            "Forecast for {} from {} ({} days): {} models, {} skipped",
            dataset.city,
            start_date,
            horizon,
            outcome.models.len(),
            outcome.skipped.len()
        );
        for line in &lines {
            tracing::info!("{}", line);
        }

        if let Some(dir) = &self.config.overlay_dir {
            for target in outcome.models.keys() {
                let overlay = HistoryOverlay::build(dataset, table, &groups, *target, self.config.history_tail);
                match overlay.write_csv(dir, &dataset.city) {
                    Ok(path) => tracing::debug!("Wrote {}", path.display()),
                    Err(e) => tracing::warn!("Failed to write {} overlay: {}", target, e),
                }
            }
        }

        Ok(ForecastReport {
            city: dataset.city.clone(),
            start_date,
            horizon_days: horizon,
            evaluations: outcome.evaluations(),
            skipped_targets: outcome.skipped,
            summary: dataset.summary(),
            groups,
            lines,
        })
    }
}

/// День после последнего наблюдения
fn default_start_date(dataset: &WeatherDataset) -> Result<NaiveDate> {
    let last = dataset
        .last_timestamp()
        .ok_or_else(|| ForecastError::InvalidConfig(format!("{} has no usable records", dataset.city)))?;
    last.date()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| ForecastError::InvalidConfig(format!("date out of range after {}", last)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainedModel;
    use crate::types::Record;
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn config() -> ForecastConfig {
        ForecastConfig {
            n_estimators: 5,
            ..ForecastConfig::default()
        }
    }

    fn dataset() -> WeatherDataset {
        let start = NaiveDateTime::parse_from_str("2024-04-01 00:00", "%Y-%m-%d %H:%M").unwrap();
        let records = (0..96)
            .map(|h| Record {
                timestamp: start + Duration::hours(h),
                values: BTreeMap::from([(TargetParameter::Temperature, (h % 24) as f64)]),
            })
            .collect();
        WeatherDataset::new("Test", records, vec![TargetParameter::Temperature])
    }

    #[test]
    fn default_start_is_day_after_last_record() {
        let report = ForecastPipeline::new(config())
            .unwrap()
            .run_dataset(&dataset(), &RunOptions::default())
            .unwrap();
        assert_eq!(report.start_date, NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());
        assert_eq!(report.groups.len(), 20);
        assert_eq!(report.lines.len(), 20);
        assert_eq!(report.skipped_targets.len(), 4);
        assert_eq!(report.evaluations.len(), 1);
    }

    #[test]
    fn options_override_horizon_start_and_targets() {
        let options = RunOptions {
            horizon: Some(2),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            targets: Some(vec![TargetParameter::Temperature]),
        };
        let report = ForecastPipeline::new(config())
            .unwrap()
            .run_dataset(&dataset(), &options)
            .unwrap();
        assert_eq!(report.groups.len(), 8);
        assert_eq!(report.groups[0].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(report.skipped_targets.is_empty());
    }

    #[test]
    fn empty_dataset_without_start_date_fails() {
        let empty = WeatherDataset::new("Empty", Vec::new(), vec![TargetParameter::Temperature]);
        let pipeline = ForecastPipeline::new(config()).unwrap();
        assert!(pipeline.run_dataset(&empty, &RunOptions::default()).is_err());
    }

    #[test]
    fn horizon_above_limit_is_rejected() {
        let options = RunOptions {
            horizon: Some(u32::MAX),
            ..RunOptions::default()
        };
        let err = ForecastPipeline::new(config())
            .unwrap()
            .run_dataset(&dataset(), &options)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn failed_prediction_moves_target_to_skipped() {
        let pipeline = ForecastPipeline::new(config()).unwrap();
        let data = dataset();
        let mut outcome = pipeline
            .trainer
            .train_all(&data, &pipeline.config.time_slots, &[TargetParameter::Temperature]);
        outcome
            .models
            .insert(TargetParameter::Humidity, TrainedModel::untrained(TargetParameter::Humidity));

        let report = pipeline.finish(&data, outcome, 1, &RunOptions::default()).unwrap();
        assert_eq!(report.groups.len(), 4);
        assert!(report.lines.iter().all(|l| !l.contains("Humidity")));
        assert_eq!(report.skipped_targets.len(), 1);
        assert_eq!(report.skipped_targets[0].target, TargetParameter::Humidity);
        assert_eq!(report.evaluations.len(), 1);
    }

    #[test]
    fn report_carries_dataset_summary() {
        let report = ForecastPipeline::new(config())
            .unwrap()
            .run_dataset(&dataset(), &RunOptions::default())
            .unwrap();
        assert_eq!(report.summary.record_count, 96);
        // 0..23 по кругу, среднее 11.5
        assert_eq!(report.summary.average(TargetParameter::Temperature), Some(11.5));
        assert!(report.summary.averages.iter().all(|v| v.target == TargetParameter::Temperature));
    }

    #[test]
    fn overlays_are_written_per_trained_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForecastConfig {
            overlay_dir: Some(dir.path().to_path_buf()),
            ..config()
        };
        ForecastPipeline::new(config)
            .unwrap()
            .run_dataset(&dataset(), &RunOptions::default())
            .unwrap();
        assert!(dir.path().join("Temperature_forecast_Test.csv").is_file());
        assert!(!dir.path().join("Humidity_forecast_Test.csv").exists());
    }
}

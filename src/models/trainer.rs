//! Обучение моделей по каждому параметру

use std::collections::BTreeMap;
use std::sync::Arc;

use linfa::prelude::SingleTargetRegression;
use linfa::Dataset;
use ndarray::Ix1;

use crate::error::{ForecastError, Result};
use crate::models::forest::{ForestParams, RandomForestRegressor};
use crate::preprocessing::{CalendarFeatureDeriver, DatasetSplitter, TimeSlotTable};
use crate::types::{FeatureRow, SkippedTarget, TargetEvaluation, TargetParameter, WeatherDataset};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub mse: f64,
    pub test_rows: usize,
}

/// Обученная модель одного параметра
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub target: TargetParameter,
    pub train_rows: usize,
    pub evaluation: Option<Evaluation>,
    forest: RandomForestRegressor,
}

impl TrainedModel {
    pub fn predict_rows(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        let features = crate::preprocessing::feature_matrix(rows);
        Ok(self.forest.predict(&features)?.to_vec())
    }

    /// MSE на отложенной выборке
    pub fn evaluate(&self, test: &Dataset<f64, f64, Ix1>) -> Result<f64> {
        let predicted = self.forest.predict(test.records())?;
        Ok(predicted.mean_squared_error(test.targets())?)
    }

    #[cfg(test)]
    pub(crate) fn untrained(target: TargetParameter) -> Self {
        Self {
            target,
            train_rows: 0,
            evaluation: None,
            forest: RandomForestRegressor::new(ForestParams::default()),
        }
    }

    pub fn to_evaluation(&self) -> Option<TargetEvaluation> {
        self.evaluation.map(|e| TargetEvaluation {
            target: self.target,
            mse: e.mse,
            train_rows: self.train_rows,
            test_rows: e.test_rows,
        })
    }
}

/// Модели, обученные для доступных параметров, и пропущенные параметры
#[derive(Debug, Clone, Default)]
pub struct TrainingOutcome {
    pub models: BTreeMap<TargetParameter, TrainedModel>,
    pub skipped: Vec<SkippedTarget>,
}

impl TrainingOutcome {
    fn record(mut self, target: TargetParameter, result: Result<TrainedModel>) -> Self {
        match result {
            Ok(model) => {
                self.models.insert(target, model);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", target, e);
                self.skipped.push(SkippedTarget {
                    target,
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    pub fn evaluations(&self) -> Vec<TargetEvaluation> {
        self.models.values().filter_map(|m| m.to_evaluation()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainer {
    params: ForestParams,
    holdout_fraction: f64,
    min_training_rows: usize,
}

impl ModelTrainer {
    pub fn new(params: ForestParams, holdout_fraction: f64, min_training_rows: usize) -> Result<Self> {
        // проверка параметров разделения
        DatasetSplitter::new(holdout_fraction, params.seed, min_training_rows)?;
        if params.n_estimators == 0 {
            return Err(ForecastError::InvalidConfig("n_estimators must be positive".to_string()));
        }
        Ok(Self {
            params,
            holdout_fraction,
            min_training_rows,
        })
    }

    fn splitter(&self) -> Result<DatasetSplitter> {
        DatasetSplitter::new(self.holdout_fraction, self.params.seed, self.min_training_rows)
    }

    /// Разделение, обучение и оценка одного параметра
    pub fn train_target(&self, target: TargetParameter, pairs: &[(FeatureRow, f64)]) -> Result<TrainedModel> {
        let split = self.splitter()?.split(target, pairs)?;

        let mut forest = RandomForestRegressor::new(self.params.clone());
        forest.fit(split.train.records(), split.train.targets())?;

        let mut model = TrainedModel {
            target,
            train_rows: split.train.records().nrows(),
            evaluation: None,
            forest,
        };

        let mse = model.evaluate(&split.test)?;
        tracing::info!("{} model trained. MSE: {:.2}", target, mse);
        model.evaluation = Some(Evaluation {
            mse,
            test_rows: split.test.records().nrows(),
        });

        Ok(model)
    }

    fn prepare(
        &self,
        dataset: &WeatherDataset,
        table: &TimeSlotTable,
        target: TargetParameter,
    ) -> Result<Vec<(FeatureRow, f64)>> {
        CalendarFeatureDeriver::new(table).derive_target_pairs(dataset, target)
    }

    /// Последовательное обучение. Ошибка одного параметра не прерывает остальные.
    pub fn train_all(
        &self,
        dataset: &WeatherDataset,
        table: &TimeSlotTable,
        desired: &[TargetParameter],
    ) -> TrainingOutcome {
        ordered_targets(desired)
            .into_iter()
            .fold(TrainingOutcome::default(), |outcome, target| {
                let result = self
                    .prepare(dataset, table, target)
                    .and_then(|pairs| self.train_target(target, &pairs));
                outcome.record(target, result)
            })
    }

    /// То же, что `train_all`, но каждый параметр обучается в отдельной
    /// blocking-задаче tokio. Результаты сливаются в порядке объявления.
    pub async fn train_all_concurrent(
        &self,
        dataset: Arc<WeatherDataset>,
        table: Arc<TimeSlotTable>,
        desired: &[TargetParameter],
    ) -> TrainingOutcome {
        let mut handles = Vec::new();
        for target in ordered_targets(desired) {
            let trainer = self.clone();
            let dataset = Arc::clone(&dataset);
            let table = Arc::clone(&table);
            let handle = tokio::task::spawn_blocking(move || {
                trainer
                    .prepare(&dataset, &table, target)
                    .and_then(|pairs| trainer.train_target(target, &pairs))
            });
            handles.push((target, handle));
        }

        let mut outcome = TrainingOutcome::default();
        for (target, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(ForecastError::Model(format!("training task failed: {}", e))));
            outcome = outcome.record(target, result);
        }
        outcome
    }
}

fn ordered_targets(desired: &[TargetParameter]) -> Vec<TargetParameter> {
    let mut targets = desired.to_vec();
    targets.sort();
    targets.dedup();
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use chrono::{Duration, NaiveDate};

    fn dataset(days: i64, targets: &[TargetParameter]) -> WeatherDataset {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let records = (0..days * 24)
            .map(|h| {
                let timestamp = start + Duration::hours(h);
                let hour = (h % 24) as f64;
                let values = targets
                    .iter()
                    .enumerate()
                    .map(|(k, t)| (*t, 10.0 * k as f64 + hour + (h / 24) as f64 * 0.1))
                    .collect();
                Record { timestamp, values }
            })
            .collect();
        WeatherDataset::new("Test", records, targets.to_vec())
    }

    fn trainer() -> ModelTrainer {
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        ModelTrainer::new(params, 0.2, 10).unwrap()
    }

    #[test]
    fn trains_available_and_skips_missing() {
        let data = dataset(5, &[TargetParameter::Temperature, TargetParameter::Humidity]);
        let table = TimeSlotTable::default();
        let outcome = trainer().train_all(&data, &table, &TargetParameter::ALL);

        assert_eq!(
            outcome.models.keys().copied().collect::<Vec<_>>(),
            vec![TargetParameter::Temperature, TargetParameter::Humidity]
        );
        assert_eq!(
            outcome.skipped.iter().map(|s| s.target).collect::<Vec<_>>(),
            vec![TargetParameter::Rainfall, TargetParameter::WindSpeed, TargetParameter::Pressure]
        );
        assert!(outcome.skipped[0].reason.contains("missing"));

        let evaluations = outcome.evaluations();
        assert_eq!(evaluations.len(), 2);
        assert!(evaluations.iter().all(|e| e.mse.is_finite() && e.test_rows > 0));
        assert_eq!(evaluations[0].train_rows + evaluations[0].test_rows, 120);
    }

    #[test]
    fn insufficient_rows_skip_only_that_target() {
        let mut data = dataset(2, &[TargetParameter::Temperature, TargetParameter::Pressure]);
        for record in data.records.iter_mut().skip(3) {
            record.values.remove(&TargetParameter::Pressure);
        }
        let table = TimeSlotTable::default();
        let outcome = trainer().train_all(&data, &table, &[TargetParameter::Pressure, TargetParameter::Temperature]);

        assert!(outcome.models.contains_key(&TargetParameter::Temperature));
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].target, TargetParameter::Pressure);
    }

    #[test]
    fn training_is_deterministic() {
        let data = dataset(4, &[TargetParameter::Temperature]);
        let table = TimeSlotTable::default();
        let a = trainer().train_all(&data, &table, &[TargetParameter::Temperature]);
        let b = trainer().train_all(&data, &table, &[TargetParameter::Temperature]);
        assert_eq!(
            a.models[&TargetParameter::Temperature].evaluation,
            b.models[&TargetParameter::Temperature].evaluation
        );
    }

    #[tokio::test]
    async fn concurrent_training_matches_sequential() {
        let data = dataset(4, &[TargetParameter::Temperature, TargetParameter::WindSpeed]);
        let table = TimeSlotTable::default();
        let sequential = trainer().train_all(&data, &table, &TargetParameter::ALL);
        let concurrent = trainer()
            .train_all_concurrent(Arc::new(data), Arc::new(table), &TargetParameter::ALL)
            .await;

        assert_eq!(sequential.skipped.len(), concurrent.skipped.len());
        for (target, model) in &sequential.models {
            assert_eq!(model.evaluation, concurrent.models[target].evaluation);
        }
    }

    #[test]
    fn evaluation_uses_one_dimensional_targets() {
        let data = dataset(3, &[TargetParameter::Temperature]);
        let table = TimeSlotTable::default();
        let pairs = CalendarFeatureDeriver::new(&table)
            .derive_target_pairs(&data, TargetParameter::Temperature)
            .unwrap();
        let split = DatasetSplitter::new(0.2, 42, 10)
            .unwrap()
            .split(TargetParameter::Temperature, &pairs)
            .unwrap();
        assert_eq!(split.test.targets().ndim(), 1);
        assert_eq!(split.test.records().nrows(), split.test.targets().len());

        let model = trainer().train_target(TargetParameter::Temperature, &pairs).unwrap();
        let mse = model.evaluate(&split.test).unwrap();
        assert!(mse.is_finite() && mse >= 0.0);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(ModelTrainer::new(params, 0.2, 10).is_err());
        assert!(ModelTrainer::new(ForestParams::default(), 1.5, 10).is_err());
    }
}

//! Применение обученных моделей к будущим строкам

use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};
use crate::models::TrainedModel;
use crate::types::{FeatureRow, ForecastRow, SkippedTarget, TargetParameter};

pub struct Predictor;

/// Строки с колонками успешных моделей и параметры, чьи модели упали
#[derive(Debug, Clone, Default)]
pub struct Predictions {
    pub rows: Vec<ForecastRow>,
    pub failed: Vec<SkippedTarget>,
}

impl Predictor {
    /// Добавляет к каждой строке предсказание одной модели.
    /// Календарные поля не меняются.
    pub fn apply(model: &TrainedModel, rows: &mut [ForecastRow]) -> Result<()> {
        let features: Vec<FeatureRow> = rows.iter().map(|r| r.features).collect();
        let predictions = model.predict_rows(&features)?;
        if predictions.len() != rows.len() {
            return Err(ForecastError::Model(format!(
                "{} predictions for {} rows",
                predictions.len(),
                rows.len()
            )));
        }

        for (row, value) in rows.iter_mut().zip(predictions) {
            row.predictions.insert(model.target, value);
        }
        Ok(())
    }

    /// Все модели по очереди на одних и тех же строках. Ошибка одной модели
    /// не прерывает остальные: ее колонка не добавляется.
    pub fn predict_all(models: &BTreeMap<TargetParameter, TrainedModel>, inputs: &[FeatureRow]) -> Predictions {
        let mut rows: Vec<ForecastRow> = inputs.iter().copied().map(ForecastRow::new).collect();
        let mut failed = Vec::new();
        for model in models.values() {
            // apply пишет в строки только после успешного предсказания
            if let Err(e) = Self::apply(model, &mut rows) {
                tracing::warn!("Prediction for {} failed: {}", model.target, e);
                failed.push(SkippedTarget {
                    target: model.target,
                    reason: e.to_string(),
                });
            }
        }
        Predictions { rows, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::FutureInputGenerator;
    use crate::models::{ForestParams, ModelTrainer};
    use crate::preprocessing::TimeSlotTable;
    use crate::types::{Record, WeatherDataset};
    use chrono::{Duration, NaiveDate};

    fn models(targets: &[TargetParameter]) -> BTreeMap<TargetParameter, TrainedModel> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let records = (0..72)
            .map(|h| Record {
                timestamp: start + Duration::hours(h),
                values: targets.iter().map(|t| (*t, (h % 24) as f64)).collect(),
            })
            .collect();
        let dataset = WeatherDataset::new("Test", records, targets.to_vec());
        let trainer = ModelTrainer::new(
            ForestParams {
                n_estimators: 5,
                ..ForestParams::default()
            },
            0.2,
            10,
        )
        .unwrap();
        trainer.train_all(&dataset, &TimeSlotTable::default(), targets).models
    }

    #[test]
    fn one_column_per_model_and_rows_preserved() {
        let table = TimeSlotTable::default();
        let inputs = FutureInputGenerator::new(&table)
            .generate(NaiveDate::from_ymd_opt(2024, 2, 4).unwrap(), 5)
            .unwrap();
        let models = models(&[TargetParameter::Temperature, TargetParameter::Pressure]);

        let predictions = Predictor::predict_all(&models, &inputs);
        assert!(predictions.failed.is_empty());
        let rows = predictions.rows;
        assert_eq!(rows.len(), inputs.len());
        for (row, input) in rows.iter().zip(&inputs) {
            assert_eq!(&row.features, input);
            assert_eq!(
                row.predicted_columns(),
                vec!["predicted_Temperature".to_string(), "predicted_Pressure".to_string()]
            );
        }
    }

    #[test]
    fn no_models_means_no_columns() {
        let table = TimeSlotTable::default();
        let inputs = FutureInputGenerator::new(&table)
            .generate(NaiveDate::from_ymd_opt(2024, 2, 4).unwrap(), 1)
            .unwrap();
        let rows = Predictor::predict_all(&BTreeMap::new(), &inputs).rows;
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.predictions.is_empty()));
    }

    #[test]
    fn failing_model_is_reported_and_others_kept() {
        let table = TimeSlotTable::default();
        let inputs = FutureInputGenerator::new(&table)
            .generate(NaiveDate::from_ymd_opt(2024, 2, 4).unwrap(), 2)
            .unwrap();
        let mut models = models(&[TargetParameter::Temperature]);
        models.insert(TargetParameter::Humidity, TrainedModel::untrained(TargetParameter::Humidity));

        let predictions = Predictor::predict_all(&models, &inputs);
        assert_eq!(predictions.rows.len(), inputs.len());
        assert!(predictions
            .rows
            .iter()
            .all(|r| r.predicted_columns() == vec!["predicted_Temperature".to_string()]));
        assert_eq!(predictions.failed.len(), 1);
        assert_eq!(predictions.failed[0].target, TargetParameter::Humidity);
        assert!(predictions.failed[0].reason.contains("not trained"));
    }
}

//! Feature engineering: календарные признаки

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2};

use crate::error::{ForecastError, Result};
use crate::preprocessing::time_slots::TimeSlotTable;
use crate::types::{FeatureRow, Record, TargetParameter, WeatherDataset};

/// Преобразует наблюдения и синтетические точки в `FeatureRow`.
pub struct CalendarFeatureDeriver<'a> {
    table: &'a TimeSlotTable,
}

impl<'a> CalendarFeatureDeriver<'a> {
    pub fn new(table: &'a TimeSlotTable) -> Self {
        Self { table }
    }

    pub fn derive(&self, record: &Record) -> Result<FeatureRow> {
        self.derive_at(record.timestamp)
    }

    pub fn derive_at(&self, timestamp: NaiveDateTime) -> Result<FeatureRow> {
        self.derive_for(timestamp.date(), timestamp.hour())
    }

    /// Признаки для даты и часа. Час берется как есть, слот по таблице.
    pub fn derive_for(&self, date: NaiveDate, hour: u32) -> Result<FeatureRow> {
        let slot_index = self.table.index_for_hour(hour).ok_or_else(|| {
            ForecastError::InvalidTimeSlotTable(format!("hour {} is not covered", hour))
        })?;

        Ok(FeatureRow {
            date,
            hour,
            day: date.day(),
            month: date.month(),
            weekday: date.weekday().num_days_from_monday(),
            slot: self.table.entries()[slot_index].slot,
            slot_index,
        })
    }

    /// Пары (признаки, значение) для записей, где есть значение цели
    pub fn derive_target_pairs(
        &self,
        dataset: &WeatherDataset,
        target: TargetParameter,
    ) -> Result<Vec<(FeatureRow, f64)>> {
        if !dataset.has_target(target) {
            return Err(ForecastError::MissingColumn(target));
        }

        let mut pairs = Vec::with_capacity(dataset.records.len());
        for record in &dataset.records {
            if let Some(value) = record.value(target) {
                pairs.push((self.derive(record)?, value));
            }
        }

        Ok(pairs)
    }
}

/// Матрица признаков для набора строк
pub fn feature_matrix(rows: &[FeatureRow]) -> Array2<f64> {
    let mut features = Array2::zeros((rows.len(), FeatureRow::N_FEATURES));
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.to_features().into_iter().enumerate() {
            features[[i, j]] = value;
        }
    }
    features
}

pub fn pairs_to_arrays(pairs: &[(FeatureRow, f64)]) -> (Array2<f64>, Array1<f64>) {
    let rows: Vec<FeatureRow> = pairs.iter().map(|(row, _)| *row).collect();
    let targets: Array1<f64> = pairs.iter().map(|(_, value)| *value).collect();
    (feature_matrix(&rows), targets)
}

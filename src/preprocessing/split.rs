//! Разделение на train/test

use linfa::Dataset;
use ndarray::Ix1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{ForecastError, Result};
use crate::preprocessing::feature_engineering::pairs_to_arrays;
use crate::types::{FeatureRow, TargetParameter};

pub struct TrainTestSplit {
    pub train: Dataset<f64, f64, Ix1>,
    pub test: Dataset<f64, f64, Ix1>,
}

/// Случайное разделение с фиксированным seed. Хронологический порядок
/// между train и test не гарантируется.
pub struct DatasetSplitter {
    holdout_fraction: f64,
    seed: u64,
    min_rows: usize,
}

impl DatasetSplitter {
    pub fn new(holdout_fraction: f64, seed: u64, min_rows: usize) -> Result<Self> {
        if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "holdout fraction must be in (0, 1), got {}",
                holdout_fraction
            )));
        }
        Ok(Self {
            holdout_fraction,
            seed,
            min_rows: min_rows.max(2),
        })
    }

    pub fn split(&self, target: TargetParameter, pairs: &[(FeatureRow, f64)]) -> Result<TrainTestSplit> {
        if pairs.len() < self.min_rows {
            return Err(ForecastError::InsufficientData {
                target,
                rows: pairs.len(),
            });
        }

        let (records, targets) = pairs_to_arrays(pairs);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let shuffled = Dataset::new(records, targets).shuffle(&mut rng);
        let (train, test) = shuffled.split_with_ratio((1.0 - self.holdout_fraction) as f32);

        if train.records().nrows() == 0 || test.records().nrows() == 0 {
            return Err(ForecastError::InsufficientData {
                target,
                rows: pairs.len(),
            });
        }

        Ok(TrainTestSplit { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{CalendarFeatureDeriver, TimeSlotTable};
    use chrono::NaiveDate;

    fn pairs(n: usize) -> Vec<(FeatureRow, f64)> {
        let table = TimeSlotTable::default();
        let deriver = CalendarFeatureDeriver::new(&table);
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        (0..n)
            .map(|i| {
                let date = start + chrono::Duration::days((i / 24) as i64);
                let row = deriver.derive_for(date, (i % 24) as u32).unwrap();
                (row, i as f64)
            })
            .collect()
    }

    #[test]
    fn split_is_disjoint_and_complete() {
        let splitter = DatasetSplitter::new(0.2, 42, 10).unwrap();
        let data = pairs(100);
        let split = splitter.split(TargetParameter::Temperature, &data).unwrap();

        assert_eq!(split.train.targets().len() + split.test.targets().len(), 100);
        assert!((19..=21).contains(&split.test.targets().len()));

        let mut all: Vec<f64> = split
            .train
            .targets()
            .iter()
            .chain(split.test.targets().iter())
            .copied()
            .collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, (0..100).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible() {
        let splitter = DatasetSplitter::new(0.2, 7, 10).unwrap();
        let data = pairs(50);
        let a = splitter.split(TargetParameter::Humidity, &data).unwrap();
        let b = splitter.split(TargetParameter::Humidity, &data).unwrap();
        assert_eq!(a.test.targets(), b.test.targets());
        assert_eq!(a.train.records(), b.train.records());
    }

    #[test]
    fn rejects_bad_fraction_and_small_input() {
        assert!(DatasetSplitter::new(0.0, 42, 10).is_err());
        assert!(DatasetSplitter::new(1.0, 42, 10).is_err());

        let splitter = DatasetSplitter::new(0.2, 42, 10).unwrap();
        let err = splitter.split(TargetParameter::Rainfall, &pairs(5)).err().unwrap();
        assert!(matches!(err, ForecastError::InsufficientData { rows: 5, .. }));
    }
}

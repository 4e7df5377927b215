//! Генерация будущих входов: день × время суток

use chrono::{Duration, NaiveDate};

use crate::error::{ForecastError, Result};
use crate::preprocessing::{CalendarFeatureDeriver, TimeSlotTable};
use crate::types::FeatureRow;

/// Жесткий предел горизонта, год с запасом
pub const MAX_HORIZON_DAYS: u32 = 366;

pub struct FutureInputGenerator<'a> {
    table: &'a TimeSlotTable,
    max_horizon: u32,
}

impl<'a> FutureInputGenerator<'a> {
    pub fn new(table: &'a TimeSlotTable) -> Self {
        Self {
            table,
            max_horizon: MAX_HORIZON_DAYS,
        }
    }

    pub fn with_max_horizon(mut self, max_horizon: u32) -> Self {
        self.max_horizon = max_horizon.min(MAX_HORIZON_DAYS);
        self
    }

    /// По одной строке на (день, слот) для дней `0..horizon`, слоты в порядке
    /// таблицы. Час строки - представительный час слота.
    pub fn generate(&self, start: NaiveDate, horizon: u32) -> Result<Vec<FeatureRow>> {
        if horizon == 0 {
            return Err(ForecastError::InvalidConfig("horizon must be at least one day".to_string()));
        }
        if horizon > self.max_horizon {
            return Err(ForecastError::InvalidConfig(format!(
                "horizon {} exceeds the limit of {} days",
                horizon, self.max_horizon
            )));
        }

        let deriver = CalendarFeatureDeriver::new(self.table);
        let mut rows = Vec::with_capacity(horizon as usize * self.table.len());
        for offset in 0..horizon {
            let date = start
                .checked_add_signed(Duration::days(offset as i64))
                .ok_or_else(|| ForecastError::InvalidConfig(format!("date out of range: {} + {}", start, offset)))?;

            for entry in self.table.entries() {
                rows.push(deriver.derive_for(date, entry.representative_hour())?);
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeSlot;
    use std::collections::HashSet;

    #[test]
    fn five_day_horizon_has_unique_pairs() {
        let table = TimeSlotTable::default();
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let rows = FutureInputGenerator::new(&table).generate(start, 5).unwrap();

        assert_eq!(rows.len(), 5 * table.len());
        let keys: HashSet<(NaiveDate, TimeSlot)> = rows.iter().map(|r| (r.date, r.slot)).collect();
        assert_eq!(keys.len(), rows.len());

        // переход через год
        assert_eq!(rows.last().unwrap().date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        assert_eq!(rows.last().unwrap().month, 1);
    }

    #[test]
    fn rows_use_midpoint_hours_in_table_order() {
        let table = TimeSlotTable::default();
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let rows = FutureInputGenerator::new(&table).generate(start, 1).unwrap();

        let got: Vec<(TimeSlot, u32)> = rows.iter().map(|r| (r.slot, r.hour)).collect();
        assert_eq!(
            got,
            vec![
                (TimeSlot::Morning, 8),
                (TimeSlot::Afternoon, 14),
                (TimeSlot::Evening, 18),
                (TimeSlot::Night, 22),
            ]
        );
        // 2024-07-01 понедельник
        assert!(rows.iter().all(|r| r.weekday == 0 && r.day == 1 && r.month == 7));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let table = TimeSlotTable::default();
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert!(FutureInputGenerator::new(&table).generate(start, 0).is_err());
    }

    #[test]
    fn oversized_horizon_is_rejected_before_allocation() {
        let table = TimeSlotTable::default();
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let err = FutureInputGenerator::new(&table).generate(start, u32::MAX).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));

        let limited = FutureInputGenerator::new(&table).with_max_horizon(3);
        assert_eq!(limited.generate(start, 3).unwrap().len(), 3 * table.len());
        assert!(limited.generate(start, 4).is_err());
    }
}

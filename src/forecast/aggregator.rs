//! Группировка прогноза по (дата, время суток) и отчеты

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::preprocessing::TimeSlotTable;
use crate::types::{ForecastGroup, ForecastRow, TargetParameter, TargetValue, TimeSlot, WeatherDataset};

pub struct ForecastAggregator<'a> {
    table: &'a TimeSlotTable,
}

impl<'a> ForecastAggregator<'a> {
    pub fn new(table: &'a TimeSlotTable) -> Self {
        Self { table }
    }

    /// Одна группа на каждую пару (дата, слот), по дате и порядку таблицы.
    /// Внутри группы значение цели - среднее по строкам группы.
    pub fn aggregate(&self, rows: &[ForecastRow]) -> Vec<ForecastGroup> {
        let mut groups: BTreeMap<(NaiveDate, usize), (TimeSlot, BTreeMap<TargetParameter, (f64, usize)>)> =
            BTreeMap::new();

        for row in rows {
            let order = self.table.position(row.features.slot).unwrap_or(usize::MAX);
            let (_, sums) = groups
                .entry((row.features.date, order))
                .or_insert_with(|| (row.features.slot, BTreeMap::new()));
            for (target, value) in &row.predictions {
                let (sum, count) = sums.entry(*target).or_insert((0.0, 0));
                *sum += value;
                *count += 1;
            }
        }

        groups
            .into_iter()
            .map(|((date, _), (slot, sums))| ForecastGroup {
                date,
                slot,
                values: sums
                    .into_iter()
                    .map(|(target, (sum, count))| TargetValue {
                        target,
                        value: sum / count as f64,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// `<date> | <slot> | <Target>: <value> | ...`
pub fn format_group(group: &ForecastGroup) -> String {
    let mut line = format!("{} | {}", group.date.format("%Y-%m-%d"), group.slot);
    for value in &group.values {
        line.push_str(&format!(" | {}: {:.2}", value.target, value.value));
    }
    line
}

pub fn format_report(groups: &[ForecastGroup]) -> Vec<String> {
    groups.iter().map(format_group).collect()
}

/// Хвост истории и прогноз одного параметра
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOverlay {
    pub target: TargetParameter,
    pub history: Vec<(NaiveDateTime, f64)>,
    pub forecast: Vec<(NaiveDateTime, f64)>,
}

impl HistoryOverlay {
    pub fn build(
        dataset: &WeatherDataset,
        table: &TimeSlotTable,
        groups: &[ForecastGroup],
        target: TargetParameter,
        history_tail: usize,
    ) -> Self {
        let forecast = groups
            .iter()
            .filter_map(|g| {
                let hour = table.representative_hour(g.slot)?;
                let at = g.date.and_hms_opt(hour, 0, 0)?;
                g.value(target).map(|v| (at, v))
            })
            .collect();

        Self {
            target,
            history: dataset.tail(target, history_tail),
            forecast,
        }
    }

    pub fn file_name(&self, city: &str) -> String {
        format!("{}_forecast_{}.csv", self.target, city)
    }

    /// Записывает `series,timestamp,value` в `dir`
    pub fn write_csv(&self, dir: &Path, city: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name(city));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["series", "timestamp", "value"])?;

        let series = self
            .history
            .iter()
            .map(|p| ("history", p))
            .chain(self.forecast.iter().map(|p| ("forecast", p)));
        for (kind, (at, value)) in series {
            writer.write_record([
                kind.to_string(),
                at.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{:.4}", value),
            ])?;
        }

        writer.flush()?;
        Ok(path)
    }
}

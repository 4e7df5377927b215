/// Типы данных для прогнозирования погоды

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Прогнозируемый метеопараметр. Порядок объявления = порядок в отчете.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetParameter {
    Temperature,
    Humidity,
    Rainfall,
    WindSpeed,
    Pressure,
}

impl TargetParameter {
    pub const ALL: [TargetParameter; 5] = [
        TargetParameter::Temperature,
        TargetParameter::Humidity,
        TargetParameter::Rainfall,
        TargetParameter::WindSpeed,
        TargetParameter::Pressure,
    ];

    /// Имя колонки во входном CSV
    pub fn column_name(&self) -> &'static str {
        match self {
            TargetParameter::Temperature => "Temperature",
            TargetParameter::Humidity => "Humidity",
            TargetParameter::Rainfall => "Rainfall",
            TargetParameter::WindSpeed => "WindSpeed",
            TargetParameter::Pressure => "Pressure",
        }
    }

    /// Имя колонки с предсказанием
    pub fn predicted_column(&self) -> String {
        format!("predicted_{}", self.column_name())
    }
}

impl fmt::Display for TargetParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for TargetParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetParameter::ALL
            .into_iter()
            .find(|t| t.column_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown target parameter: {}", s))
    }
}

/// Время суток
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    pub fn name(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "Morning",
            TimeSlot::Afternoon => "Afternoon",
            TimeSlot::Evening => "Evening",
            TimeSlot::Night => "Night",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Историческое наблюдение
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<TargetParameter, f64>,
}

impl Record {
    pub fn value(&self, target: TargetParameter) -> Option<f64> {
        self.values.get(&target).copied()
    }
}

/// Загруженные наблюдения одного города, отсортированные по времени
#[derive(Debug, Clone)]
pub struct WeatherDataset {
    pub city: String,
    pub records: Vec<Record>,
    /// Целевые колонки, присутствующие в заголовке источника
    pub available: Vec<TargetParameter>,
}

impl WeatherDataset {
    pub fn new(city: impl Into<String>, mut records: Vec<Record>, available: Vec<TargetParameter>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        let mut available = available;
        available.sort();
        available.dedup();
        Self {
            city: city.into(),
            records,
            available,
        }
    }

    pub fn has_target(&self, target: TargetParameter) -> bool {
        self.available.contains(&target)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Последние `n` наблюдений параметра
    pub fn tail(&self, target: TargetParameter, n: usize) -> Vec<(NaiveDateTime, f64)> {
        let series: Vec<(NaiveDateTime, f64)> = self
            .records
            .iter()
            .filter_map(|r| r.value(target).map(|v| (r.timestamp, v)))
            .collect();
        let start = series.len().saturating_sub(n);
        series[start..].to_vec()
    }

    /// Первая и последняя записи и средние по тем колонкам из
    /// `WeatherSummary::TARGETS`, что есть в источнике
    pub fn summary(&self) -> WeatherSummary {
        let averages = WeatherSummary::TARGETS
            .into_iter()
            .filter(|t| self.has_target(*t))
            .filter_map(|target| {
                let (sum, count) = self
                    .records
                    .iter()
                    .filter_map(|r| r.value(target))
                    .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                (count > 0).then(|| TargetValue {
                    target,
                    value: round2(sum / count as f64),
                })
            })
            .collect();

        WeatherSummary {
            city: self.city.clone(),
            record_count: self.records.len(),
            first_record: self.records.first().cloned(),
            last_record: self.records.last().cloned(),
            averages,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Сводка по историческим наблюдениям города
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub city: String,
    pub record_count: usize,
    pub first_record: Option<Record>,
    pub last_record: Option<Record>,
    /// Средние, округленные до сотых
    pub averages: Vec<TargetValue>,
}

impl WeatherSummary {
    pub const TARGETS: [TargetParameter; 3] = [
        TargetParameter::Temperature,
        TargetParameter::Humidity,
        TargetParameter::Rainfall,
    ];

    pub fn average(&self, target: TargetParameter) -> Option<f64> {
        self.averages.iter().find(|v| v.target == target).map(|v| v.value)
    }
}

/// Календарные признаки одной точки (реальной или синтетической)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
    /// 0 = понедельник
    pub weekday: u32,
    pub slot: TimeSlot,
    /// Позиция слота в таблице времени суток
    pub slot_index: usize,
}

impl FeatureRow {
    pub const N_FEATURES: usize = 5;

    pub fn to_features(&self) -> [f64; Self::N_FEATURES] {
        [
            self.hour as f64,
            self.day as f64,
            self.month as f64,
            self.weekday as f64,
            self.slot_index as f64,
        ]
    }
}

/// Синтетическая строка с предсказаниями по каждой обученной цели
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub features: FeatureRow,
    pub predictions: BTreeMap<TargetParameter, f64>,
}

impl ForecastRow {
    pub fn new(features: FeatureRow) -> Self {
        Self {
            features,
            predictions: BTreeMap::new(),
        }
    }

    /// Колонки предсказаний вида `predicted_<Target>`
    pub fn predicted_columns(&self) -> Vec<String> {
        self.predictions.keys().map(|t| t.predicted_column()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetValue {
    pub target: TargetParameter,
    pub value: f64,
}

/// Строка итогового прогноза: (дата, время суток) и значение по каждой цели
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastGroup {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub values: Vec<TargetValue>,
}

impl ForecastGroup {
    pub fn value(&self, target: TargetParameter) -> Option<f64> {
        self.values.iter().find(|v| v.target == target).map(|v| v.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEvaluation {
    pub target: TargetParameter,
    pub mse: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub target: TargetParameter,
    pub reason: String,
}

/// Результат полного прогона для одного города
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub city: String,
    pub start_date: NaiveDate,
    pub horizon_days: u32,
    pub groups: Vec<ForecastGroup>,
    pub evaluations: Vec<TargetEvaluation>,
    pub skipped_targets: Vec<SkippedTarget>,
    pub summary: WeatherSummary,
    pub lines: Vec<String>,
}

/// Тело запроса `/api/forecast`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub city: String,
    #[serde(default)]
    pub horizon: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub targets: Option<Vec<TargetParameter>>,
}

//! Загрузка наблюдений из CSV

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{ForecastError, Result};
use crate::types::{Record, TargetParameter, WeatherDataset};

pub const TIMESTAMP_COLUMN: &str = "Timestamp";

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M",
];

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ForecastError::InvalidTimestamp(raw.to_string()))
}

/// Имя города попадает в путь к файлу, поэтому допускаются только
/// буквы, цифры, `_`, `-` и пробел.
pub fn validate_city(city: &str) -> Result<()> {
    let valid = !city.trim().is_empty()
        && city
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ');
    if valid {
        Ok(())
    } else {
        Err(ForecastError::InvalidCity(city.to_string()))
    }
}

pub fn city_path(data_dir: &Path, city: &str) -> Result<PathBuf> {
    validate_city(city)?;
    Ok(data_dir.join(format!("{}.csv", city)))
}

/// Загружает `<data_dir>/<city>.csv`
pub fn load_city(data_dir: &Path, city: &str) -> Result<WeatherDataset> {
    let path = city_path(data_dir, city)?;
    if !path.is_file() {
        return Err(ForecastError::DataFileNotFound(path));
    }
    let file = std::fs::File::open(&path)?;
    let dataset = read_records(city, std::io::BufReader::new(file))?;
    tracing::info!(
        "Loaded {} records for {} from {}",
        dataset.records.len(),
        city,
        path.display()
    );
    Ok(dataset)
}

/// Читает наблюдения. Строки с нераспознанным временем или с другим числом
/// полей отбрасываются, пустые или нечисловые значения параметров считаются
/// отсутствующими.
pub fn read_records<R: Read>(city: &str, reader: R) -> Result<WeatherDataset> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let timestamp_idx = headers
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .ok_or(ForecastError::MissingTimestampColumn)?;

    let columns: Vec<(TargetParameter, usize)> = TargetParameter::ALL
        .into_iter()
        .filter_map(|t| headers.iter().position(|h| h == t.column_name()).map(|idx| (t, idx)))
        .collect();

    let mut records = Vec::new();
    let mut rejected = 0usize;
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) => {
                tracing::warn!("Dropping row {} of {}: {}", line + 2, city, e);
                rejected += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let raw = row.get(timestamp_idx).unwrap_or_default();
        let timestamp = match parse_timestamp(raw) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!("Dropping row {} of {}: {}", line + 2, city, e);
                rejected += 1;
                continue;
            }
        };

        let mut values = BTreeMap::new();
        for (target, idx) in &columns {
            let cell = row.get(*idx).unwrap_or_default();
            match cell.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    values.insert(*target, value);
                }
                _ => tracing::debug!("Row {} of {}: no {} value in {:?}", line + 2, city, target, cell),
            }
        }
        records.push(Record { timestamp, values });
    }

    if rejected > 0 {
        tracing::warn!("{}: {} malformed rows dropped", city, rejected);
    }

    Ok(WeatherDataset::new(
        city,
        records,
        columns.into_iter().map(|(t, _)| t).collect(),
    ))
}

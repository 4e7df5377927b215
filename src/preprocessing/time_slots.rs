//! Таблица времени суток

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::types::TimeSlot;

/// Включительный диапазон часов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

/// Слот и его диапазоны. Первый диапазон основной: по нему считается
/// представительный час для синтетических строк.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotEntry {
    pub slot: TimeSlot,
    pub ranges: Vec<HourRange>,
}

impl TimeSlotEntry {
    pub fn representative_hour(&self) -> u32 {
        // ranges непустой: проверено в TimeSlotTable::new
        let primary = self.ranges[0];
        (primary.start + primary.end) / 2
    }
}

/// Упорядоченное разбиение суток на слоты.
///
/// Таблица неизменяема и проверяется при создании: каждый час 0-23
/// покрыт ровно одним слотом.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlotTable {
    entries: Vec<TimeSlotEntry>,
    by_hour: [usize; 24],
}

impl TimeSlotTable {
    pub fn new(entries: Vec<TimeSlotEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ForecastError::InvalidTimeSlotTable("table is empty".to_string()));
        }

        let mut by_hour: [Option<usize>; 24] = [None; 24];
        for (idx, entry) in entries.iter().enumerate() {
            if entries[..idx].iter().any(|e| e.slot == entry.slot) {
                return Err(ForecastError::InvalidTimeSlotTable(format!(
                    "{} is declared twice",
                    entry.slot
                )));
            }
            if entry.ranges.is_empty() {
                return Err(ForecastError::InvalidTimeSlotTable(format!(
                    "{} has no hour ranges",
                    entry.slot
                )));
            }

            for range in &entry.ranges {
                if range.start > range.end || range.end > 23 {
                    return Err(ForecastError::InvalidTimeSlotTable(format!(
                        "{} has invalid range {}-{}",
                        entry.slot, range.start, range.end
                    )));
                }
                for hour in range.start..=range.end {
                    let cell = &mut by_hour[hour as usize];
                    if let Some(other) = *cell {
                        return Err(ForecastError::InvalidTimeSlotTable(format!(
                            "hour {} belongs to both {} and {}",
                            hour, entries[other].slot, entry.slot
                        )));
                    }
                    *cell = Some(idx);
                }
            }
        }

        let mut resolved = [0usize; 24];
        for (hour, cell) in by_hour.iter().enumerate() {
            resolved[hour] = cell.ok_or_else(|| {
                ForecastError::InvalidTimeSlotTable(format!("hour {} is not covered", hour))
            })?;
        }

        Ok(Self {
            entries,
            by_hour: resolved,
        })
    }

    pub fn entries(&self) -> &[TimeSlotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Индекс слота для часа (0-23)
    pub fn index_for_hour(&self, hour: u32) -> Option<usize> {
        self.by_hour.get(hour as usize).copied()
    }

    pub fn slot_for_hour(&self, hour: u32) -> Option<TimeSlot> {
        self.index_for_hour(hour).map(|idx| self.entries[idx].slot)
    }

    pub fn position(&self, slot: TimeSlot) -> Option<usize> {
        self.entries.iter().position(|e| e.slot == slot)
    }

    pub fn representative_hour(&self, slot: TimeSlot) -> Option<u32> {
        self.position(slot).map(|idx| self.entries[idx].representative_hour())
    }
}

impl Default for TimeSlotTable {
    /// Morning 5-11, Afternoon 12-16, Evening 17-20, Night 21-23 и 0-4
    fn default() -> Self {
        Self {
            entries: default_entries(),
            by_hour: [
                3, 3, 3, 3, 3, // 0-4
                0, 0, 0, 0, 0, 0, 0, // 5-11
                1, 1, 1, 1, 1, // 12-16
                2, 2, 2, 2, // 17-20
                3, 3, 3, // 21-23
            ],
        }
    }
}

impl Serialize for TimeSlotTable {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeSlotTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<TimeSlotEntry>::deserialize(deserializer)?;
        TimeSlotTable::new(entries).map_err(serde::de::Error::custom)
    }
}

pub fn default_entries() -> Vec<TimeSlotEntry> {
    vec![
        TimeSlotEntry {
            slot: TimeSlot::Morning,
            ranges: vec![HourRange::new(5, 11)],
        },
        TimeSlotEntry {
            slot: TimeSlot::Afternoon,
            ranges: vec![HourRange::new(12, 16)],
        },
        TimeSlotEntry {
            slot: TimeSlot::Evening,
            ranges: vec![HourRange::new(17, 20)],
        },
        TimeSlotEntry {
            slot: TimeSlot::Night,
            ranges: vec![HourRange::new(21, 23), HourRange::new(0, 4)],
        },
    ]
}

/// Модуль предобработки данных

pub mod feature_engineering;
pub mod split;
pub mod time_slots;

pub use feature_engineering::{feature_matrix, CalendarFeatureDeriver};
pub use split::{DatasetSplitter, TrainTestSplit};
pub use time_slots::{HourRange, TimeSlotEntry, TimeSlotTable};

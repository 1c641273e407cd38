use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

use crate::metrics::DayLog;

/// One logged day for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub calories: i32,
    pub weight: Option<f64>,
    pub protein: Option<i32>,
    pub carbs: Option<i32>,
    pub fat: Option<i32>,
}

impl From<&DailyEntry> for DayLog {
    fn from(e: &DailyEntry) -> Self {
        Self {
            date: e.date,
            calories: e.calories,
            weight: e.weight,
        }
    }
}

/// Validated values for a full entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFields {
    pub date: Date,
    pub calories: i32,
    pub weight: Option<f64>,
    pub protein: Option<i32>,
    pub carbs: Option<i32>,
    pub fat: Option<i32>,
}

/// Validated partial update. Outer `None` leaves a column alone; for the
/// nullable columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub date: Option<Date>,
    pub calories: Option<i32>,
    pub weight: Option<Option<f64>>,
    pub protein: Option<Option<i32>>,
    pub carbs: Option<Option<i32>>,
    pub fat: Option<Option<i32>>,
}

impl EntryPatch {
    pub fn apply(&self, entry: &mut DailyEntry) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(calories) = self.calories {
            entry.calories = calories;
        }
        if let Some(weight) = self.weight {
            entry.weight = weight;
        }
        if let Some(protein) = self.protein {
            entry.protein = protein;
        }
        if let Some(carbs) = self.carbs {
            entry.carbs = carbs;
        }
        if let Some(fat) = self.fat {
            entry.fat = fat;
        }
    }
}

impl From<&EntryFields> for EntryPatch {
    fn from(f: &EntryFields) -> Self {
        Self {
            date: Some(f.date),
            calories: Some(f.calories),
            weight: Some(f.weight),
            protein: Some(f.protein),
            carbs: Some(f.carbs),
            fat: Some(f.fat),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EntryStoreError {
    #[error("an entry for {0} already exists")]
    DateTaken(Date),
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn entry() -> DailyEntry {
        DailyEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date: date!(2024 - 04 - 01),
            calories: 2100,
            weight: Some(172.4),
            protein: Some(140),
            carbs: None,
            fat: Some(70),
        }
    }

    #[test]
    fn patch_leaves_missing_fields_and_clears_explicit_nulls() {
        let mut e = entry();
        let patch = EntryPatch {
            calories: Some(1900),
            weight: Some(None),
            ..Default::default()
        };
        patch.apply(&mut e);
        assert_eq!(e.calories, 1900);
        assert_eq!(e.weight, None);
        assert_eq!(e.protein, Some(140));
        assert_eq!(e.date, date!(2024 - 04 - 01));
    }

    #[test]
    fn serializes_with_iso_date_and_camel_case() {
        let json = serde_json::to_value(entry()).unwrap();
        assert_eq!(json["date"], "2024-04-01");
        assert!(json.get("userId").is_some());
        assert!(json["carbs"].is_null());
    }
}

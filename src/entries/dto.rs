use serde::{Deserialize, Deserializer};
use time::Date;

use crate::metrics::projection::DEFAULT_PROJECTION_DAYS;

/// POST /entries. Creates the day or overwrites it if already logged.
#[derive(Debug, Deserialize)]
pub struct UpsertEntryRequest {
    pub date: Date,
    pub calories: i32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub protein: Option<i32>,
    #[serde(default)]
    pub carbs: Option<i32>,
    #[serde(default)]
    pub fat: Option<i32>,
}

/// PATCH /entries/:id. Absent fields are untouched, `null` clears.
#[derive(Debug, Default, Deserialize)]
pub struct PatchEntryRequest {
    #[serde(default)]
    pub date: Option<Date>,
    #[serde(default)]
    pub calories: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub protein: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub carbs: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fat: Option<Option<i32>>,
}

/// Distinguishes a present `null` from a missing field.
fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}
fn default_days() -> u32 {
    DEFAULT_PROJECTION_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn patch_tells_null_from_missing() {
        let p: PatchEntryRequest =
            serde_json::from_str(r#"{"calories": 1800, "weight": null}"#).unwrap();
        assert_eq!(p.calories, Some(1800));
        assert_eq!(p.weight, Some(None));
        assert_eq!(p.protein, None);
        assert_eq!(p.date, None);
    }

    #[test]
    fn upsert_parses_iso_date() {
        let r: UpsertEntryRequest =
            serde_json::from_str(r#"{"date": "2024-02-29", "calories": 2200, "weight": 181.4}"#)
                .unwrap();
        assert_eq!(r.date, date!(2024 - 02 - 29));
        assert_eq!(r.weight, Some(181.4));
        assert_eq!(r.fat, None);
    }

    #[test]
    fn projection_days_default() {
        let q: ProjectionQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.days, DEFAULT_PROJECTION_DAYS);
    }
}

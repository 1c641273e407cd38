use tracing::debug;
use uuid::Uuid;

use super::dto::{PatchEntryRequest, ProjectionQuery, RangeQuery, UpsertEntryRequest};
use super::repo::EntryStore;
use super::repo_types::{DailyEntry, EntryFields, EntryPatch, EntryStoreError};
use crate::errors::ValidationError;
use crate::metrics::{self, projection::MAX_PROJECTION_DAYS, CalculatedMetrics, DayLog, Projection};

const CALORIES: (i32, i32) = (0, 20_000);
const WEIGHT: (f64, f64) = (20.0, 1_000.0);
const PROTEIN: (i32, i32) = (0, 1_000);
const CARBS: (i32, i32) = (0, 2_000);
const FAT: (i32, i32) = (0, 1_000);

fn check_int(field: &'static str, value: i32, (min, max): (i32, i32)) -> Result<i32, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: f64::from(min),
            max: f64::from(max),
        })
    }
}

fn check_weight(value: f64) -> Result<f64, ValidationError> {
    let (min, max) = WEIGHT;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field: "weight",
            min,
            max,
        })
    }
}

fn check_macro(
    field: &'static str,
    value: Option<i32>,
    bounds: (i32, i32),
) -> Result<Option<i32>, ValidationError> {
    value.map(|v| check_int(field, v, bounds)).transpose()
}

impl UpsertEntryRequest {
    pub fn validate(self) -> Result<EntryFields, ValidationError> {
        Ok(EntryFields {
            date: self.date,
            calories: check_int("calories", self.calories, CALORIES)?,
            weight: self.weight.map(check_weight).transpose()?,
            protein: check_macro("protein", self.protein, PROTEIN)?,
            carbs: check_macro("carbs", self.carbs, CARBS)?,
            fat: check_macro("fat", self.fat, FAT)?,
        })
    }
}

impl PatchEntryRequest {
    pub fn validate(self) -> Result<EntryPatch, ValidationError> {
        Ok(EntryPatch {
            date: self.date,
            calories: self
                .calories
                .map(|c| check_int("calories", c, CALORIES))
                .transpose()?,
            weight: self
                .weight
                .map(|w| w.map(check_weight).transpose())
                .transpose()?,
            protein: self
                .protein
                .map(|p| check_macro("protein", p, PROTEIN))
                .transpose()?,
            carbs: self
                .carbs
                .map(|c| check_macro("carbs", c, CARBS))
                .transpose()?,
            fat: self.fat.map(|f| check_macro("fat", f, FAT)).transpose()?,
        })
    }
}

impl RangeQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(ValidationError::InvertedRange),
            _ => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

impl ProjectionQuery {
    pub fn validate(&self) -> Result<u32, ValidationError> {
        if (1..=MAX_PROJECTION_DAYS).contains(&self.days) {
            Ok(self.days)
        } else {
            Err(ValidationError::ProjectionDays {
                max: MAX_PROJECTION_DAYS,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Writes the day's entry, replacing whatever was logged for that date.
pub async fn upsert_entry(
    store: &dyn EntryStore,
    user_id: Uuid,
    fields: &EntryFields,
) -> anyhow::Result<(Upserted, DailyEntry)> {
    if let Some(existing) = store.get_by_date(user_id, fields.date).await? {
        return overwrite(store, user_id, existing.id, fields).await;
    }

    match store.create(user_id, fields).await {
        Ok(entry) => Ok((Upserted::Created, entry)),
        // Lost a race with another write for the same date.
        Err(e) if e.downcast_ref::<EntryStoreError>().is_some() => {
            let existing = store
                .get_by_date(user_id, fields.date)
                .await?
                .ok_or(e)?;
            overwrite(store, user_id, existing.id, fields).await
        }
        Err(e) => Err(e),
    }
}

async fn overwrite(
    store: &dyn EntryStore,
    user_id: Uuid,
    id: Uuid,
    fields: &EntryFields,
) -> anyhow::Result<(Upserted, DailyEntry)> {
    let entry = store
        .update(user_id, id, &EntryPatch::from(fields))
        .await?
        .ok_or_else(|| anyhow::anyhow!("entry {id} vanished during upsert"))?;
    Ok((Upserted::Updated, entry))
}

fn day_logs(entries: &[DailyEntry]) -> Vec<DayLog> {
    entries.iter().map(DayLog::from).collect()
}

pub async fn metrics_for_user(
    store: &dyn EntryStore,
    user_id: Uuid,
) -> anyhow::Result<CalculatedMetrics> {
    let entries = store.list_by_user(user_id).await?;
    let metrics = metrics::compute(&day_logs(&entries));
    debug!(%user_id, entries = entries.len(), "metrics computed");
    Ok(metrics)
}

pub async fn projection_for_user(
    store: &dyn EntryStore,
    user_id: Uuid,
    days: u32,
) -> anyhow::Result<Projection> {
    let logs = day_logs(&store.list_by_user(user_id).await?);
    let metrics = metrics::compute(&logs);
    Ok(Projection::from_history(&logs, &metrics, days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::repo::MemoryEntryStore;
    use time::macros::date;

    fn upsert_req(calories: i32, weight: Option<f64>) -> UpsertEntryRequest {
        UpsertEntryRequest {
            date: date!(2024 - 03 - 01),
            calories,
            weight,
            protein: None,
            carbs: None,
            fat: None,
        }
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(upsert_req(-1, None).validate().is_err());
        assert!(upsert_req(20_001, None).validate().is_err());
        assert_eq!(
            upsert_req(2000, Some(19.9)).validate().unwrap_err(),
            ValidationError::OutOfRange {
                field: "weight",
                min: 20.0,
                max: 1000.0
            }
        );
        let mut r = upsert_req(2000, None);
        r.carbs = Some(2_001);
        assert!(r.validate().is_err());
    }

    #[test]
    fn accepts_bounds() {
        let mut r = upsert_req(0, Some(1000.0));
        r.protein = Some(1000);
        r.carbs = Some(0);
        let f = r.validate().unwrap();
        assert_eq!(f.calories, 0);
        assert_eq!(f.weight, Some(1000.0));
    }

    #[test]
    fn patch_validates_only_present_values() {
        let p = PatchEntryRequest {
            weight: Some(None),
            ..Default::default()
        };
        assert_eq!(p.validate().unwrap().weight, Some(None));

        let p = PatchEntryRequest {
            fat: Some(Some(5_000)),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn inverted_range_rejected() {
        let q = RangeQuery {
            from: Some(date!(2024 - 02 - 01)),
            to: Some(date!(2024 - 01 - 01)),
        };
        assert_eq!(q.validate(), Err(ValidationError::InvertedRange));
        assert!(RangeQuery::default().is_open());
    }

    #[test]
    fn projection_days_bounds() {
        assert!(ProjectionQuery { days: 0 }.validate().is_err());
        assert!(ProjectionQuery { days: 366 }.validate().is_err());
        assert_eq!(ProjectionQuery { days: 365 }.validate(), Ok(365));
    }

    #[tokio::test]
    async fn upsert_creates_then_overwrites_same_date() {
        let store = MemoryEntryStore::default();
        let user = Uuid::new_v4();

        let first = upsert_req(2000, Some(180.0)).validate().unwrap();
        let (kind, created) = upsert_entry(&store, user, &first).await.unwrap();
        assert_eq!(kind, Upserted::Created);

        let second = upsert_req(1800, None).validate().unwrap();
        let (kind, updated) = upsert_entry(&store, user, &second).await.unwrap();
        assert_eq!(kind, Upserted::Updated);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.calories, 1800);
        assert_eq!(updated.weight, None);

        assert_eq!(store.list_by_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn metrics_only_see_own_entries() {
        let store = MemoryEntryStore::default();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        for (d, w) in [(date!(2024 - 01 - 01), 180.0), (date!(2024 - 01 - 08), 179.0)] {
            let f = EntryFields {
                date: d,
                calories: 2000,
                weight: Some(w),
                protein: None,
                carbs: None,
                fat: None,
            };
            store.create(me, &f).await.unwrap();
        }
        let noise = EntryFields {
            date: date!(2024 - 01 - 09),
            calories: 9000,
            weight: Some(250.0),
            protein: None,
            carbs: None,
            fat: None,
        };
        store.create(other, &noise).await.unwrap();

        let m = metrics_for_user(&store, me).await.unwrap();
        assert_eq!(m.daily_deficit, Some(-500));
        assert_eq!(m.maintenance_calories, Some(2500));

        let p = projection_for_user(&store, me, 14).await.unwrap();
        assert_eq!(p.points.len(), 14);
        assert!((p.points[13].weight - 177.0).abs() < 1e-9);
    }
}

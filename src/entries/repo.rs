use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::repo_types::{DailyEntry, EntryFields, EntryPatch, EntryStoreError};

/// User-scoped access to daily entries. Every query is filtered by `user_id`.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// All entries, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<DailyEntry>>;
    /// Entries within an inclusive, optionally open-ended range, oldest first.
    async fn list_in_range(
        &self,
        user_id: Uuid,
        from: Option<Date>,
        to: Option<Date>,
    ) -> anyhow::Result<Vec<DailyEntry>>;
    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<DailyEntry>>;
    async fn get_by_date(&self, user_id: Uuid, date: Date) -> anyhow::Result<Option<DailyEntry>>;
    async fn create(&self, user_id: Uuid, fields: &EntryFields) -> anyhow::Result<DailyEntry>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &EntryPatch,
    ) -> anyhow::Result<Option<DailyEntry>>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgEntryStore {
    db: PgPool,
}

impl PgEntryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ENTRY_COLUMNS: &str = "id, user_id, date, calories, weight, protein, carbs, fat";

fn map_unique_violation(e: sqlx::Error, date: Date) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return EntryStoreError::DateTaken(date).into();
        }
    }
    anyhow::Error::new(e)
}

async fn lock_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<DailyEntry>> {
    let row = sqlx::query_as::<_, DailyEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock entry")?;
    Ok(row)
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<DailyEntry>> {
        let rows = sqlx::query_as::<_, DailyEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
              FROM daily_entries
             WHERE user_id = $1
             ORDER BY date DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list entries by user")?;
        Ok(rows)
    }

    async fn list_in_range(
        &self,
        user_id: Uuid,
        from: Option<Date>,
        to: Option<Date>,
    ) -> anyhow::Result<Vec<DailyEntry>> {
        let rows = sqlx::query_as::<_, DailyEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
              FROM daily_entries
             WHERE user_id = $1
               AND ($2::date IS NULL OR date >= $2)
               AND ($3::date IS NULL OR date <= $3)
             ORDER BY date ASC
            "#
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .context("list entries in range")?;
        Ok(rows)
    }

    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<DailyEntry>> {
        let row = sqlx::query_as::<_, DailyEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get entry by id")?;
        Ok(row)
    }

    async fn get_by_date(&self, user_id: Uuid, date: Date) -> anyhow::Result<Option<DailyEntry>> {
        let row = sqlx::query_as::<_, DailyEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE user_id = $1 AND date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await
        .context("get entry by date")?;
        Ok(row)
    }

    async fn create(&self, user_id: Uuid, fields: &EntryFields) -> anyhow::Result<DailyEntry> {
        let row = sqlx::query_as::<_, DailyEntry>(&format!(
            r#"
            INSERT INTO daily_entries (user_id, date, calories, weight, protein, carbs, fat)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(fields.date)
        .bind(fields.calories)
        .bind(fields.weight)
        .bind(fields.protein)
        .bind(fields.carbs)
        .bind(fields.fat)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, fields.date))?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &EntryPatch,
    ) -> anyhow::Result<Option<DailyEntry>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let Some(mut entry) = lock_entry(&mut tx, user_id, id).await? else {
            return Ok(None);
        };
        patch.apply(&mut entry);

        let row = sqlx::query_as::<_, DailyEntry>(&format!(
            r#"
            UPDATE daily_entries
               SET date = $3, calories = $4, weight = $5, protein = $6, carbs = $7, fat = $8
             WHERE id = $1 AND user_id = $2
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(entry.date)
        .bind(entry.calories)
        .bind(entry.weight)
        .bind(entry.protein)
        .bind(entry.carbs)
        .bind(entry.fat)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, entry.date))?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(row))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM daily_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete entry")?;
        Ok(res.rows_affected() > 0)
    }
}

/// In-process store with the same uniqueness rule as the table.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryEntryStore {
    rows: tokio::sync::RwLock<Vec<DailyEntry>>,
}

#[cfg(test)]
#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<DailyEntry>> {
        let mut out: Vec<DailyEntry> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(out)
    }

    async fn list_in_range(
        &self,
        user_id: Uuid,
        from: Option<Date>,
        to: Option<Date>,
    ) -> anyhow::Result<Vec<DailyEntry>> {
        let mut out: Vec<DailyEntry> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| from.map_or(true, |f| e.date >= f) && to.map_or(true, |t| e.date <= t))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.date);
        Ok(out)
    }

    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<DailyEntry>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|e| e.id == id && e.user_id == user_id)
            .cloned())
    }

    async fn get_by_date(&self, user_id: Uuid, date: Date) -> anyhow::Result<Option<DailyEntry>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|e| e.date == date && e.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: Uuid, fields: &EntryFields) -> anyhow::Result<DailyEntry> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|e| e.user_id == user_id && e.date == fields.date) {
            return Err(EntryStoreError::DateTaken(fields.date).into());
        }
        let entry = DailyEntry {
            id: Uuid::new_v4(),
            user_id,
            date: fields.date,
            calories: fields.calories,
            weight: fields.weight,
            protein: fields.protein,
            carbs: fields.carbs,
            fat: fields.fat,
        };
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &EntryPatch,
    ) -> anyhow::Result<Option<DailyEntry>> {
        let mut rows = self.rows.write().await;
        let Some(idx) = rows.iter().position(|e| e.id == id && e.user_id == user_id) else {
            return Ok(None);
        };
        let mut updated = rows[idx].clone();
        patch.apply(&mut updated);
        let clash = rows
            .iter()
            .any(|e| e.id != id && e.user_id == user_id && e.date == updated.date);
        if clash {
            return Err(EntryStoreError::DateTaken(updated.date).into());
        }
        rows[idx] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|e| !(e.id == id && e.user_id == user_id));
        Ok(rows.len() < before)
    }
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{PatchEntryRequest, ProjectionQuery, RangeQuery, UpsertEntryRequest};
use super::repo_types::{DailyEntry, EntryStoreError};
use super::services::{metrics_for_user, projection_for_user, upsert_entry, Upserted};
use crate::{
    auth::services::AuthUser,
    errors::internal,
    metrics::{CalculatedMetrics, Projection},
    state::AppState,
};

pub fn entry_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(upsert))
        .route(
            "/entries/:id",
            get(get_entry).patch(patch_entry).delete(delete_entry),
        )
}

pub fn metrics_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/projection", get(get_projection))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Entry not found".into())
}

/// Date clashes become 409, anything else is a 500.
fn store_error(e: anyhow::Error) -> (StatusCode, String) {
    match e.downcast_ref::<EntryStoreError>() {
        Some(clash) => (StatusCode::CONFLICT, clash.to_string()),
        None => internal(e),
    }
}

#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DailyEntry>>, (StatusCode, String)> {
    range.validate()?;
    let entries = if range.is_open() {
        state.entries.list_by_user(user_id).await
    } else {
        state
            .entries
            .list_in_range(user_id, range.from, range.to)
            .await
    }
    .map_err(internal)?;
    Ok(Json(entries))
}

#[instrument(skip(state, payload))]
pub async fn upsert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpsertEntryRequest>,
) -> Result<(StatusCode, Json<DailyEntry>), (StatusCode, String)> {
    let fields = payload.validate().map_err(|e| {
        warn!(error = %e, %user_id, "entry rejected");
        e
    })?;

    let (kind, entry) = upsert_entry(state.entries.as_ref(), user_id, &fields)
        .await
        .map_err(store_error)?;

    let status = match kind {
        Upserted::Created => StatusCode::CREATED,
        Upserted::Updated => StatusCode::OK,
    };
    info!(%user_id, entry_id = %entry.id, date = %entry.date, ?kind, "entry saved");
    Ok((status, Json(entry)))
}

#[instrument(skip(state))]
pub async fn get_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DailyEntry>, (StatusCode, String)> {
    state
        .entries
        .get_by_id(user_id, id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(not_found)
}

#[instrument(skip(state, payload))]
pub async fn patch_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PatchEntryRequest>,
) -> Result<Json<DailyEntry>, (StatusCode, String)> {
    let patch = payload.validate()?;
    let updated = state
        .entries
        .update(user_id, id, &patch)
        .await
        .map_err(store_error)?
        .ok_or_else(not_found)?;
    info!(%user_id, entry_id = %id, "entry updated");
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.entries.delete(user_id, id).await {
        Ok(true) => {
            info!(%user_id, entry_id = %id, "entry deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(not_found()),
        Err(e) => {
            error!(error = %e, %user_id, %id, "delete_entry failed");
            Err(internal(e))
        }
    }
}

#[instrument(skip(state))]
pub async fn get_metrics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CalculatedMetrics>, (StatusCode, String)> {
    let metrics = metrics_for_user(state.entries.as_ref(), user_id)
        .await
        .map_err(internal)?;
    Ok(Json(metrics))
}

#[instrument(skip(state))]
pub async fn get_projection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ProjectionQuery>,
) -> Result<Json<Projection>, (StatusCode, String)> {
    let days = q.validate()?;
    let projection = projection_for_user(state.entries.as_ref(), user_id, days)
        .await
        .map_err(internal)?;
    Ok(Json(projection))
}

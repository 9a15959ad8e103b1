use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use fundflow_core::ledger::{
    Category, EntryChange, LedgerEntry, LedgerEntryUpdate, NewCategory, NewLedgerEntry,
};
use fundflow_core::recalculation::RecalculationResult;
use fundflow_core::Period;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntriesQuery {
    user_id: String,
    /// `YYYY-MM`, the current month when absent
    month: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordedTransaction {
    entry: LedgerEntry,
    recalculation: RecalculationResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangedTransaction {
    #[serde(flatten)]
    change: EntryChange,
    /// One result per affected month, oldest placement first
    recalculations: Vec<RecalculationResult>,
}

async fn get_transactions(
    Query(query): Query<EntriesQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let period = match query.month {
        Some(month) => month.parse::<Period>()?,
        None => Period::current(),
    };
    let entries = state
        .ledger_service
        .get_entries_for_period(&query.user_id, &period)?;
    Ok(Json(entries))
}

async fn get_transaction(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<LedgerEntry>> {
    Ok(Json(state.ledger_service.get_entry(&id)?))
}

/// Records the entry, then recalculates the month it falls in. The profile is
/// checked first so an entry is never stored for a user the engine cannot run
/// for; recalculation failures surface as errors.
async fn record_transaction(
    State(state): State<Arc<AppState>>,
    Json(new_entry): Json<NewLedgerEntry>,
) -> ApiResult<(StatusCode, Json<RecordedTransaction>)> {
    state.profile_service.get_profile(&new_entry.user_id)?;
    let entry = state.ledger_service.record_entry(new_entry).await?;
    let recalculation = state
        .recalculation_service
        .recalculate_for_period(&entry.user_id, Period::containing(entry.recorded_at))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordedTransaction {
            entry,
            recalculation,
        }),
    ))
}

async fn recalculate_affected(
    state: &AppState,
    change: EntryChange,
) -> ApiResult<Json<ChangedTransaction>> {
    let mut recalculations = Vec::new();
    for period in change.affected_periods() {
        recalculations.push(
            state
                .recalculation_service
                .recalculate_for_period(&change.previous.user_id, period)
                .await?,
        );
    }
    Ok(Json(ChangedTransaction {
        change,
        recalculations,
    }))
}

async fn update_transaction(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<LedgerEntryUpdate>,
) -> ApiResult<Json<ChangedTransaction>> {
    let entry = state.ledger_service.get_entry(&id)?;
    state.profile_service.get_profile(&entry.user_id)?;
    let change = state.ledger_service.update_entry(&id, update).await?;
    recalculate_affected(&state, change).await
}

async fn delete_transaction(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ChangedTransaction>> {
    let entry = state.ledger_service.get_entry(&id)?;
    state.profile_service.get_profile(&entry.user_id)?;
    let change = state.ledger_service.delete_entry(&id).await?;
    recalculate_affected(&state, change).await
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(category): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let c = state.ledger_service.create_category(category).await?;
    Ok((StatusCode::CREATED, Json(c)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/transactions",
            post(record_transaction).get(get_transactions),
        )
        .route(
            "/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/categories", post(create_category))
}

use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use fundflow_core::allocations::GoalAllocation;
use fundflow_core::recalculation::{FinalizationResult, RecalculationResult};
use fundflow_core::Period;
use serde::Deserialize;

#[derive(Deserialize)]
struct RecalculateQuery {
    /// `YYYY-MM`, the current month when absent
    month: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeQuery {
    /// Restricts finalization to one user's rows
    user_id: Option<String>,
}

async fn recalculate(
    Path(user_id): Path<String>,
    Query(query): Query<RecalculateQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<RecalculationResult>> {
    let result = match query.month {
        Some(month) => {
            let period = month.parse::<Period>()?;
            state
                .recalculation_service
                .recalculate_for_period(&user_id, period)
                .await?
        }
        None => state.recalculation_service.recalculate(&user_id).await?,
    };
    Ok(Json(result))
}

async fn get_user_allocations(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<GoalAllocation>>> {
    let allocations = state.allocation_repo.get_allocations_by_user(&user_id)?;
    Ok(Json(allocations))
}

async fn finalize_month(
    Path(month): Path<String>,
    Query(query): Query<FinalizeQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<FinalizationResult>> {
    let result = match query.user_id {
        Some(user_id) => {
            state
                .finalization_service
                .finalize_user_month(&user_id, &month)
                .await?
        }
        None => state.finalization_service.finalize_month(&month).await?,
    };
    Ok(Json(result))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/allocations/recalculate/:user_id", post(recalculate))
        .route("/allocations/user/:user_id", get(get_user_allocations))
        .route("/allocations/finalize/:month", post(finalize_month))
}

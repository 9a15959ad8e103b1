use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use fundflow_core::allocations::GoalAllocation;
use fundflow_core::goals::{Goal, GoalProgressSnapshot, GoalUpdate, NewGoal};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalsQuery {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateGoalRequest {
    id: String,
    changes: GoalUpdate,
}

async fn get_goals(
    Query(query): Query<GoalsQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Goal>>> {
    let goals = state.goal_service.get_goals(&query.user_id)?;
    Ok(Json(goals))
}

async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(goal): Json<NewGoal>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    let g = state.goal_service.create_goal(goal).await?;
    Ok((StatusCode::CREATED, Json(g)))
}

async fn update_goal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateGoalRequest>,
) -> ApiResult<Json<Goal>> {
    let g = state.goal_service.update_goal(&req.id, req.changes).await?;
    Ok(Json(g))
}

async fn delete_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let _ = state.goal_service.delete_goal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Committed and pending progress of a goal, with its monthly allocations
async fn get_goal_progress(
    Path(goal_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GoalProgressSnapshot>> {
    let progress = state.goal_service.get_goal_progress(&goal_id)?;
    Ok(Json(progress))
}

async fn load_goal_allocations(
    Path(goal_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<GoalAllocation>>> {
    let allocations = state.goal_service.load_goal_allocations(&goal_id)?;
    Ok(Json(allocations))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/goals/:id/progress", get(get_goal_progress))
        .route("/goals/:id/allocations", get(load_goal_allocations))
        .route("/goals", get(get_goals).post(create_goal).put(update_goal))
        .route("/goals/:id", axum::routing::delete(delete_goal))
}

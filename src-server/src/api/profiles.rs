use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use fundflow_core::profiles::{FinancialProfile, NewFinancialProfile, ProfileUpdate};

async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<NewFinancialProfile>,
) -> ApiResult<(StatusCode, Json<FinancialProfile>)> {
    let p = state.profile_service.create_profile(profile).await?;
    Ok((StatusCode::CREATED, Json(p)))
}

async fn get_profile(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<FinancialProfile>> {
    let p = state.profile_service.get_profile(&user_id)?;
    Ok(Json(p))
}

/// Only the expectation, rate and pooling fields can be changed here
async fn update_profile(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<FinancialProfile>> {
    let p = state.profile_service.update_profile(&user_id, update).await?;
    Ok(Json(p))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", post(create_profile))
        .route("/profiles/:user_id", get(get_profile).put(update_profile))
}

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use fundflow_core::allocations::{AllocationRepository, AllocationRepositoryTrait};
use fundflow_core::db::{self, WriteHandle};
use fundflow_core::goals::{GoalRepository, GoalService, GoalServiceTrait};
use fundflow_core::ledger::{LedgerRepository, LedgerService, LedgerServiceTrait};
use fundflow_core::profiles::{ProfileRepository, ProfileService, ProfileServiceTrait};
use fundflow_core::recalculation::{
    FinalizationService, LockRegistry, RecalculationService, SqliteUnitOfWork,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::ServerConfig;

pub struct AppState {
    pub profile_service: Arc<dyn ProfileServiceTrait>,
    pub goal_service: Arc<dyn GoalServiceTrait>,
    pub ledger_service: Arc<dyn LedgerServiceTrait>,
    pub allocation_repo: Arc<dyn AllocationRepositoryTrait>,
    pub recalculation_service: Arc<RecalculationService>,
    pub finalization_service: Arc<FinalizationService>,
}

/// Opens the database and wires every service onto the SQLite stores.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let pool = db::init(&config.db_path)?;
    let writer = WriteHandle::new(pool.clone());

    let profile_repo = Arc::new(ProfileRepository::new(pool.clone(), writer.clone()));
    let goal_repo = Arc::new(GoalRepository::new(pool.clone(), writer.clone()));
    let allocation_repo = Arc::new(AllocationRepository::new(pool.clone(), writer.clone()));
    let ledger_repo = Arc::new(LedgerRepository::new(pool, writer.clone()));
    let unit_of_work = Arc::new(SqliteUnitOfWork::new(writer));
    let locks = Arc::new(LockRegistry::new());

    let recalculation_service = Arc::new(RecalculationService::new(
        profile_repo.clone(),
        goal_repo.clone(),
        allocation_repo.clone(),
        ledger_repo.clone(),
        unit_of_work.clone(),
        locks.clone(),
    ));
    let finalization_service = Arc::new(FinalizationService::new(
        goal_repo.clone(),
        allocation_repo.clone(),
        unit_of_work,
        locks,
    ));

    Ok(Arc::new(AppState {
        profile_service: Arc::new(ProfileService::new(profile_repo)),
        goal_service: Arc::new(GoalService::new(goal_repo, allocation_repo.clone())),
        ledger_service: Arc::new(LedgerService::new(ledger_repo, allocation_repo.clone())),
        allocation_repo,
        recalculation_service,
        finalization_service,
    }))
}

pub fn app_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = if config.cors_allow_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allow_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new().allow_origin(origins)
    };
    let cors = cors
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api::router())
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

use std::sync::Arc;

use axum::Router;

use crate::main_lib::AppState;

pub mod allocations;
pub mod goals;
pub mod health;
pub mod profiles;
pub mod transactions;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(profiles::router())
        .merge(goals::router())
        .merge(transactions::router())
        .merge(allocations::router())
}

//! API routes organization
//!
//! Routes are grouped by domain, each submodule exporting one router:
//! - `accounts` - registration and the caller's own record
//! - `mining` - cycles, status, welcome bonus
//! - `referrals` - referral stats and earnings
//! - `tasks` - open tasks and submissions
//! - `marketplace` - catalog, inventory, purchases and upgrades
//! - `admin` - privileged overrides, review queue, audit log
//! - `withdrawals` - the locked settlement interface

mod accounts;
mod admin;
mod marketplace;
mod mining;
mod referrals;
mod tasks;
mod withdrawals;

use crate::ApiState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Create the main router with all API endpoints
pub fn create_routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/accounts", accounts::account_routes())
        .nest("/mining", mining::mining_routes())
        .nest("/referrals", referrals::referral_routes())
        .nest("/tasks", tasks::task_routes())
        .nest("/marketplace", marketplace::marketplace_routes())
        .nest("/admin", admin::admin_routes())
        .nest("/withdrawals", withdrawals::withdrawal_routes())
}

async fn root() -> &'static str {
    "Points Economy API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    accounts: usize,
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        accounts: state.economy.ledger().len(),
    })
}

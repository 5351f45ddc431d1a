//! Mining cycle endpoints

use crate::mining_handlers::{claim_welcome_bonus, mining_status, start_mining};
use crate::ApiState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn mining_routes() -> Router<ApiState> {
    Router::new()
        .route("/start", post(start_mining))
        .route("/status", get(mining_status))
        .route("/welcome-bonus", post(claim_welcome_bonus))
}

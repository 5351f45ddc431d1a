use crate::withdrawal_handlers::prepare_withdrawal;
use crate::ApiState;
use axum::{routing::post, Router};

pub fn withdrawal_routes() -> Router<ApiState> {
    Router::new().route("/prepare", post(prepare_withdrawal))
}

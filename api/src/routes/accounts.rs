//! Account registration endpoints

use crate::account_handlers::{get_me, register_account};
use crate::ApiState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn account_routes() -> Router<ApiState> {
    Router::new()
        .route("/", post(register_account))
        .route("/me", get(get_me))
}

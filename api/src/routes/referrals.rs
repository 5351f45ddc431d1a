use crate::account_handlers::get_referrals;
use crate::ApiState;
use axum::{routing::get, Router};

pub fn referral_routes() -> Router<ApiState> {
    Router::new().route("/", get(get_referrals))
}

//! Admin endpoints
//!
//! Authorization happens per call inside the economy, not in a layer.

use crate::admin_handlers::{
    add_catalog_item, adjust_balance, audit_log, create_task, grant_referral_bonus,
    list_all_tasks, pending_submissions, review_submission, set_admin, set_catalog_item_active,
    set_status, set_task_status,
};
use crate::ApiState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn admin_routes() -> Router<ApiState> {
    Router::new()
        .route("/accounts/{id}/balance", post(adjust_balance))
        .route("/accounts/{id}/status", post(set_status))
        .route("/accounts/{id}/admin", post(set_admin))
        .route("/tasks", get(list_all_tasks).post(create_task))
        .route("/tasks/{id}/status", post(set_task_status))
        .route("/catalog", post(add_catalog_item))
        .route("/catalog/{id}/active", post(set_catalog_item_active))
        .route("/submissions", get(pending_submissions))
        .route("/submissions/{id}/review", post(review_submission))
        .route("/referrals/{id}/bonus", post(grant_referral_bonus))
        .route("/audit", get(audit_log))
}

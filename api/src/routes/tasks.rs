//! Task list and submission endpoints

use crate::task_handlers::{list_tasks, my_submissions, submit_task};
use crate::ApiState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn task_routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/submissions", get(my_submissions))
        .route("/{id}/submit", post(submit_task))
}

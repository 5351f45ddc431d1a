//! Task handlers

use crate::auth::Caller;
use crate::{ApiResult, ApiState};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use points_economy::{SubmissionStatus, Task, TaskSubmission};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    #[serde(default)]
    pub proof: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub points_awarded: Option<u64>,
}

/// Tasks currently accepting submissions
pub async fn list_tasks(
    State(state): State<ApiState>,
    Caller(_): Caller,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.economy.open_tasks(Utc::now())))
}

pub async fn my_submissions(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<Vec<TaskSubmission>>> {
    Ok(Json(state.economy.submissions_of(&account_id)))
}

pub async fn submit_task(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Path(task_id): Path<String>,
    Json(request): Json<SubmitTaskRequest>,
) -> ApiResult<Json<SubmitTaskResponse>> {
    let submission = state
        .economy
        .submit_task(&account_id, &task_id, request.proof, Utc::now())
        .await?;
    Ok(Json(SubmitTaskResponse {
        submission_id: submission.id,
        status: submission.status,
        points_awarded: submission.points_awarded,
    }))
}

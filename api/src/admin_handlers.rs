//! Admin handlers
//!
//! Every handler here goes through `authorize_admin` inside the economy.

use crate::account_handlers::AccountView;
use crate::auth::Caller;
use crate::{ApiResult, ApiState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use points_core::{AccountStatus, AuditLogEntry, NftTier};
use points_economy::{
    NewTask, NftCatalogItem, ReferralEarning, ReviewDecision, SubmissionStatus, Task, TaskStatus,
    TaskSubmission,
};
use serde::{Deserialize, Serialize};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct AdjustBalanceRequest {
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdjustBalanceResponse {
    pub account_id: String,
    pub new_balance: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub submission_id: String,
    pub final_status: SubmissionStatus,
    pub points_awarded: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct AddCatalogItemRequest {
    pub name: String,
    pub tier: NftTier,
    pub cost: u64,
}

#[derive(Debug, Deserialize)]
pub struct ItemActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReferralBonusRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn adjust_balance(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(account_id): Path<String>,
    Json(request): Json<AdjustBalanceRequest>,
) -> ApiResult<Json<AdjustBalanceResponse>> {
    let new_balance = state.economy.adjust_balance(
        &caller,
        &account_id,
        request.delta,
        request.reason.as_deref(),
        Utc::now(),
    )?;
    Ok(Json(AdjustBalanceResponse {
        account_id,
        new_balance,
    }))
}

pub async fn set_status(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(account_id): Path<String>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<Json<AccountView>> {
    let account = state
        .economy
        .set_status(&caller, &account_id, request.status, Utc::now())?;
    Ok(Json(account.into()))
}

pub async fn set_admin(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(account_id): Path<String>,
    Json(request): Json<SetAdminRequest>,
) -> ApiResult<Json<AccountView>> {
    let account = state
        .economy
        .set_admin(&caller, &account_id, request.is_admin, Utc::now())?;
    Ok(Json(account.into()))
}

pub async fn review_submission(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(submission_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    let decision = if request.approve {
        ReviewDecision::Approve
    } else {
        ReviewDecision::Reject {
            reason: request.reason,
        }
    };
    let submission =
        state
            .economy
            .review_submission(&caller, &submission_id, decision, Utc::now())?;
    Ok(Json(ReviewResponse {
        submission_id: submission.id,
        final_status: submission.status,
        points_awarded: submission.points_awarded,
    }))
}

pub async fn pending_submissions(
    State(state): State<ApiState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<TaskSubmission>>> {
    Ok(Json(state.economy.pending_submissions(&caller)?))
}

pub async fn list_all_tasks(
    State(state): State<ApiState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.economy.all_tasks(&caller)?))
}

pub async fn create_task(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Json(request): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.economy.create_task(&caller, request, Utc::now())?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn set_task_status(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(task_id): Path<String>,
    Json(request): Json<TaskStatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.economy.set_task_status(
        &caller,
        &task_id,
        request.status,
        Utc::now(),
    )?))
}

pub async fn add_catalog_item(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Json(request): Json<AddCatalogItemRequest>,
) -> ApiResult<(StatusCode, Json<NftCatalogItem>)> {
    let item = state.economy.add_catalog_item(
        &caller,
        &request.name,
        request.tier,
        request.cost,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn set_catalog_item_active(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(item_id): Path<String>,
    Json(request): Json<ItemActiveRequest>,
) -> ApiResult<Json<NftCatalogItem>> {
    Ok(Json(state.economy.set_catalog_item_active(
        &caller,
        &item_id,
        request.is_active,
        Utc::now(),
    )?))
}

pub async fn grant_referral_bonus(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(referral_id): Path<String>,
    Json(request): Json<ReferralBonusRequest>,
) -> ApiResult<Json<ReferralEarning>> {
    Ok(Json(state.economy.grant_referral_bonus(
        &caller,
        &referral_id,
        request.amount,
        Utc::now(),
    )?))
}

pub async fn audit_log(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    Ok(Json(state.economy.audit_log(&caller, limit)?))
}

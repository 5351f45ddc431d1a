//! Withdrawal handlers

use crate::auth::Caller;
use crate::{ApiResult, ApiState};
use axum::{extract::State, Json};
use chrono::Utc;
use points_economy::WithdrawalTicket;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PrepareWithdrawalRequest {
    pub amount: u64,
}

/// Always refused while settlement is locked
pub async fn prepare_withdrawal(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Json(request): Json<PrepareWithdrawalRequest>,
) -> ApiResult<Json<WithdrawalTicket>> {
    Ok(Json(state.economy.prepare_withdrawal(
        &account_id,
        request.amount,
        Utc::now(),
    )?))
}

//! Account and referral handlers

use crate::auth::Caller;
use crate::{ApiResult, ApiState};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use points_core::{format_points, Account, AccountStatus};
use points_economy::{NewAccount, Referral, ReferralEarning, ReferralStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub fingerprint_hash: Option<String>,
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountView {
    pub id: String,
    pub display_name: String,
    pub balance: u64,
    pub balance_display: String,
    pub total_mined: u64,
    pub mining_count: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub status: AccountStatus,
    pub welcome_bonus_claimed: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            balance: account.balance(),
            balance_display: format_points(account.balance()),
            id: account.id,
            display_name: account.display_name,
            total_mined: account.total_mined,
            mining_count: account.mining_count,
            current_streak: account.current_streak,
            longest_streak: account.longest_streak,
            referral_code: account.referral_code,
            referred_by: account.referred_by,
            status: account.status,
            welcome_bonus_claimed: account.welcome_bonus_claimed,
            is_admin: account.is_admin,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: AccountView,
    pub referral_stats: ReferralStats,
}

#[derive(Debug, Serialize)]
pub struct ReferralsResponse {
    pub stats: ReferralStats,
    pub referrals: Vec<Referral>,
    pub earnings: Vec<ReferralEarning>,
}

/// Register the caller's account
pub async fn register_account(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AccountView>)> {
    let account = state.economy.register_account(
        NewAccount {
            account_id,
            display_name: request.display_name,
            referral_code: request.referral_code,
            fingerprint_hash: request.fingerprint_hash,
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

pub async fn get_me(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<MeResponse>> {
    let account = state.economy.account(&account_id)?;
    Ok(Json(MeResponse {
        referral_stats: state.economy.referral_stats(&account_id),
        account: account.into(),
    }))
}

pub async fn get_referrals(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<ReferralsResponse>> {
    state.economy.account(&account_id)?;
    Ok(Json(ReferralsResponse {
        stats: state.economy.referral_stats(&account_id),
        referrals: state.economy.referrals_of(&account_id),
        earnings: state.economy.referral_earnings(&account_id),
    }))
}

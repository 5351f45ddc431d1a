//! Mining handlers

use crate::auth::Caller;
use crate::{ApiError, ApiResult, ApiState};
use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::Utc;
use points_core::{compute_fingerprint, BrowserInfo, DeviceSignals};
use points_economy::{MiningOutcome, MiningRequest, MiningStatus, WelcomeBonus};
use serde::Deserialize;

/// Either a precomputed fingerprint hash or the raw signals to derive it from
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartMiningRequest {
    pub fingerprint_hash: Option<String>,
    pub signals: Option<DeviceSignals>,
    pub browser_info: Option<BrowserInfo>,
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub async fn start_mining(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    headers: HeaderMap,
    Json(request): Json<StartMiningRequest>,
) -> ApiResult<Json<MiningOutcome>> {
    let fingerprint_hash = match (request.fingerprint_hash, &request.signals) {
        (Some(hash), _) if !hash.trim().is_empty() => hash,
        (_, Some(signals)) => compute_fingerprint(signals),
        _ => {
            return Err(ApiError::BadRequest(
                "fingerprint_hash or signals is required".to_string(),
            ))
        }
    };
    let browser_info = request
        .browser_info
        .or_else(|| request.signals.as_ref().map(BrowserInfo::from))
        .unwrap_or_default();

    let outcome = state.economy.start_mining(
        MiningRequest {
            account_id,
            fingerprint_hash,
            browser_info,
            ip_address: client_ip(&headers),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        },
        Utc::now(),
    )?;
    Ok(Json(outcome))
}

pub async fn mining_status(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<MiningStatus>> {
    Ok(Json(state.economy.mining_status(&account_id, Utc::now())?))
}

pub async fn claim_welcome_bonus(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<WelcomeBonus>> {
    Ok(Json(
        state.economy.claim_welcome_bonus(&account_id, Utc::now())?,
    ))
}

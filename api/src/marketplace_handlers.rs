//! Marketplace handlers

use crate::auth::Caller;
use crate::{ApiResult, ApiState};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use points_core::{NftTier, UserNft};
use points_economy::NftCatalogItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub catalog_item_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub unit_id: String,
    pub new_balance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EquipResponse {
    pub unit_id: String,
    pub is_equipped: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub unit_ids: Vec<String>,
    pub target_tier: NftTier,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpgradeResponse {
    pub unit_id: String,
    pub tier: NftTier,
    pub burned: Vec<String>,
    pub new_balance: u64,
}

pub async fn get_catalog(
    State(state): State<ApiState>,
    Caller(_): Caller,
) -> ApiResult<Json<Vec<NftCatalogItem>>> {
    Ok(Json(state.economy.catalog()))
}

pub async fn get_inventory(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
) -> ApiResult<Json<Vec<UserNft>>> {
    Ok(Json(state.economy.inventory(&account_id)?))
}

pub async fn purchase(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<Json<PurchaseResponse>> {
    let outcome = state
        .economy
        .purchase(&account_id, &request.catalog_item_id, Utc::now())?;
    Ok(Json(PurchaseResponse {
        unit_id: outcome.unit.id,
        new_balance: outcome.new_balance,
    }))
}

pub async fn toggle_equip(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Path(unit_id): Path<String>,
) -> ApiResult<Json<EquipResponse>> {
    let is_equipped = state.economy.toggle_equip(&account_id, &unit_id)?;
    Ok(Json(EquipResponse {
        unit_id,
        is_equipped,
    }))
}

pub async fn upgrade(
    State(state): State<ApiState>,
    Caller(account_id): Caller,
    Json(request): Json<UpgradeRequest>,
) -> ApiResult<Json<UpgradeResponse>> {
    let outcome = state.economy.upgrade(
        &account_id,
        &request.unit_ids,
        request.target_tier,
        Utc::now(),
    )?;
    Ok(Json(UpgradeResponse {
        unit_id: outcome.minted.id,
        tier: outcome.minted.tier,
        burned: outcome.burned,
        new_balance: outcome.new_balance,
    }))
}

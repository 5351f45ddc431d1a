//! Marketplace endpoints

use crate::marketplace_handlers::{get_catalog, get_inventory, purchase, toggle_equip, upgrade};
use crate::ApiState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn marketplace_routes() -> Router<ApiState> {
    Router::new()
        .route("/catalog", get(get_catalog))
        .route("/inventory", get(get_inventory))
        .route("/inventory/{id}/equip", post(toggle_equip))
        .route("/purchase", post(purchase))
        .route("/upgrade", post(upgrade))
}

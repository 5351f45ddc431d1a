//! HTTP surface of the points economy
//!
//! Handlers are thin: they resolve the caller from the bearer credential,
//! call into [`points_economy::Economy`] and map its error taxonomy onto
//! status codes in [`ApiError`].

mod account_handlers;
mod admin_handlers;
mod auth;
mod error;
mod marketplace_handlers;
mod mining_handlers;
mod routes;
mod state;
mod task_handlers;
mod withdrawal_handlers;

pub use account_handlers::AccountView;
pub use auth::Caller;
pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router with middleware applied
pub fn create_app(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    routes::create_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves
pub async fn start_server<F>(
    addr: SocketAddr,
    state: ApiState,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("API server stopped");
    Ok(())
}

//! API State Management

use points_economy::{Economy, IdentityProvider};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct ApiState {
    pub economy: Arc<Economy>,
    pub identity: Arc<dyn IdentityProvider>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(economy: Arc<Economy>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            economy,
            identity,
            start_time: Instant::now(),
        }
    }
}

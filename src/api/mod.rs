//! HTTP + WebSocket API
//!
//! REST listing endpoints and the push channel for subscribed clients.

mod routes;
mod types;
mod ws;

pub use routes::create_router;
pub use types::*;
pub use ws::WsBroadcaster;

use std::sync::Arc;

use crate::service::AggregatorService;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AggregatorService>,
    pub ws: WsBroadcaster,
}

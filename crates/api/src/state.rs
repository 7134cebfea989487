use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dispatch::DispatchContext;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
/// The dispatcher keeps no in-process job state; everything lives in the pool.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: shotserver_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn dispatch(&self) -> DispatchContext {
        DispatchContext::from_config(&self.config.dispatch)
    }
}

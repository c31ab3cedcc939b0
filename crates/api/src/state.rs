use std::sync::Arc;

use showrun_engine::QueryEngine;

use crate::config::ServerConfig;

/// Shared application state available to all request handlers.
///
/// Cloning is cheap: both fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The query engine owning all active and completed queries.
    pub engine: Arc<QueryEngine>,
    /// Server configuration loaded at startup.
    pub config: Arc<ServerConfig>,
}

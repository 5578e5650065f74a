use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::Config;
use crate::profile::ProfileRecord;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The one conversation this process serves.
    pub chat: Arc<ChatService>,
    /// Read-only after startup.
    pub profile: Arc<ProfileRecord>,
    pub config: Config,
}

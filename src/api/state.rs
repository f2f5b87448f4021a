use std::sync::Arc;

use crate::ai::chat::ChatRelay;
use crate::core::AppConfig;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub relay: ChatRelay,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(relay: ChatRelay, config: AppConfig) -> Self {
        Self { relay, config }
    }
}

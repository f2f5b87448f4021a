//! API routes module

pub mod chat;
pub mod messages;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat routes
        .nest("/chat", chat::router())
        // Conversation log routes
        .nest("/messages", messages::router())
}

//! Router for the chat API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use super::public;
use crate::ai::chat::OutcomeStatus;
use crate::api::ClientIdentity;
use crate::api::state::SharedState;

fn status_code(status: OutcomeStatus) -> StatusCode {
    match status {
        OutcomeStatus::Replied | OutcomeStatus::Cached | OutcomeStatus::Fallback => StatusCode::OK,
        OutcomeStatus::Rejected => StatusCode::BAD_REQUEST,
        OutcomeStatus::Throttled => StatusCode::TOO_MANY_REQUESTS,
        OutcomeStatus::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Relay a message to the assistant and respond with its reply. The
/// body always has a `reply`, even when the request was refused.
async fn chat_handler(
    State(state): State<SharedState>,
    ClientIdentity(identity): ClientIdentity,
    Json(payload): Json<public::ChatRequest>,
) -> impl IntoResponse {
    let outcome = state.relay.submit_message(&identity, &payload.message).await;
    tracing::debug!("Chat request from {} resolved as {:?}", identity, outcome.status);

    (
        status_code(outcome.status),
        Json(public::ChatResponse::new(&outcome.reply)),
    )
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}

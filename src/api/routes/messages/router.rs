//! Router for the conversation log API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::Query;

use super::public;
use crate::ai::chat::RelayError;
use crate::ai::chat::core::THROTTLED_REPLY;
use crate::api::ClientIdentity;
use crate::api::public::ApiError;
use crate::api::state::SharedState;

/// List logged messages, newest first unless `order=asc`
async fn list_messages(
    State(state): State<SharedState>,
    ClientIdentity(identity): ClientIdentity,
    Query(params): Query<public::MessagesQuery>,
) -> Result<Response, ApiError> {
    let order = params.order.unwrap_or_default();
    match state.relay.list_messages(&identity, order, params.limit).await {
        Ok(messages) => Ok(Json(messages).into_response()),
        Err(RelayError::Throttled) => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(public::ThrottledResponse {
                error: THROTTLED_REPLY.to_string(),
            }),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Delete every logged message
async fn clear_messages(
    State(state): State<SharedState>,
) -> Result<Json<public::Cleared>, ApiError> {
    let cleared = state.relay.clear_messages().await?;
    Ok(Json(cleared))
}

/// Create the conversation log router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_messages).delete(clear_messages))
}

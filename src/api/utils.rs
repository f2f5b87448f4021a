use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use http::request::Parts;

use crate::api::state::SharedState;

/// Identity used for rate limiting. This is the peer address of the
/// connection unless the server is configured to sit behind a
/// trusted proxy, in which case it's the address that proxy appended
/// to `X-Forwarded-For`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn from_parts(parts: &Parts, trust_forwarded_for: bool) -> Self {
        // Entries before the last one are written by the client and
        // can't be trusted
        let forwarded = if trust_forwarded_for {
            parts
                .headers
                .get_all("x-forwarded-for")
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .last()
                .map(str::to_string)
        } else {
            None
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self(
            forwarded
                .or(peer)
                .unwrap_or_else(|| String::from("unknown")),
        )
    }
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    SharedState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = SharedState::from_ref(state);
        Ok(Self::from_parts(parts, state.config.trust_forwarded_for))
    }
}

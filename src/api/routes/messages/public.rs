//! Public types for the conversation log API
use serde::{Deserialize, Serialize};

use crate::ai::chat::Order;
pub use crate::ai::chat::{ChatMessage, Cleared};

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ThrottledResponse {
    pub error: String,
}

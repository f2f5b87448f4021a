//! The core models for a relayed chat exchange.
use chrono::{DateTime, Utc};
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;

/// Who wrote a logged message. The system prompt is never logged so
/// there is no system role here.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ChatRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl ToSql for ChatRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ChatRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // Serde deserialization can only parse an enum from string if
        // it's double quoted.
        serde_json::from_str(&format!("\"{}\"", value.as_str()?))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A single logged turn. Never modified after it's written.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// How a call to `submit_message` was resolved.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Fresh reply from the completion service
    Replied,
    /// Reply served from the cache
    Cached,
    /// The completion failed and the fallback text was used
    Fallback,
    Throttled,
    Rejected,
    /// The user turn could not be stored
    Unavailable,
}

/// Result of `submit_message`. There is always a reply to show the
/// user, even when the request was refused or failed.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    pub status: OutcomeStatus,
}

impl ChatOutcome {
    pub fn new(reply: &str, status: OutcomeStatus) -> Self {
        Self {
            reply: reply.to_string(),
            status,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Cleared {
    pub status: String,
}

impl Default for Cleared {
    fn default() -> Self {
        Self {
            status: String::from("cleared"),
        }
    }
}

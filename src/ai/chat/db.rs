use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use thiserror::Error;
use tokio_rusqlite::{Connection, params};

use super::models::{ChatMessage, ChatRole, MessageId, Order};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store failed: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

/// Append-only log of every exchanged message.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, role: ChatRole, content: &str) -> Result<MessageId, StoreError>;
    async fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<ChatMessage>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

pub struct SqliteConversationStore {
    db: Connection,
}

impl SqliteConversationStore {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

// Timestamps are stored as fixed width RFC 3339 strings so that
// string ordering matches chronological ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, role: ChatRole, content: &str) -> Result<MessageId, StoreError> {
        let content = content.to_owned();
        let id = self
            .db
            .call(move |conn| {
                // Every append runs on the connection's single thread
                // so reading the last timestamp and inserting can't
                // interleave with another append.
                let tx = conn.transaction()?;
                let last: Option<String> = tx
                    .query_row(
                        "SELECT timestamp FROM message ORDER BY id DESC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;

                let mut timestamp = Utc::now();
                if let Some(last) = last.as_deref().and_then(|raw| parse_timestamp(raw).ok()) {
                    if timestamp <= last {
                        timestamp = last + Duration::microseconds(1);
                    }
                }

                tx.execute(
                    "INSERT INTO message (role, content, timestamp) VALUES (?, ?, ?)",
                    params![role, content, format_timestamp(&timestamp)],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(id)
            })
            .await?;

        Ok(id)
    }

    async fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<ChatMessage>, StoreError> {
        // SQLite treats a negative limit as no limit
        let limit = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let messages = self
            .db
            .call(move |conn| {
                let sql = format!(
                    "SELECT id, role, content, timestamp FROM message ORDER BY id {} LIMIT ?",
                    order.as_sql()
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([limit], |row| {
                        let raw_ts: String = row.get(3)?;
                        let timestamp = parse_timestamp(&raw_ts).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                        Ok(ChatMessage {
                            id: row.get(0)?,
                            role: row.get(1)?,
                            content: row.get(2)?,
                            timestamp,
                        })
                    })?
                    .collect::<Result<Vec<ChatMessage>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        Ok(messages)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.db
            .call(|conn| {
                conn.execute("DELETE FROM message", [])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

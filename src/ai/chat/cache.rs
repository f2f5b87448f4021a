//! Exact-match reply cache keyed by the normalized user message.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Error, Result};
use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

#[async_trait]
pub trait ReplyCache: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<String>, Error>;
    /// Insert or overwrite the reply for `key`
    async fn store(&self, key: &str, value: &str) -> Result<(), Error>;
}

/// Cache backed by the `ai_cache` table so replies survive restarts.
pub struct SqliteReplyCache {
    db: Connection,
}

impl SqliteReplyCache {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReplyCache for SqliteReplyCache {
    async fn lookup(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_owned();
        let reply = self
            .db
            .call(move |conn| {
                let reply = conn
                    .query_row(
                        "SELECT ai_reply FROM ai_cache WHERE user_message = ?",
                        [key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(reply)
            })
            .await?;
        Ok(reply)
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_owned();
        let value = value.to_owned();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO ai_cache (user_message, ai_reply) VALUES (?, ?)",
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Process-lifetime cache.
#[derive(Default)]
pub struct MemoryReplyCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryReplyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReplyCache for MemoryReplyCache {
    async fn lookup(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

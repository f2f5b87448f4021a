use anyhow::Result;

use crate::ai::chat::{ConversationStore, Order, SqliteConversationStore};
use crate::core::AppConfig;
use crate::core::db::async_db;

/// Print the conversation log. Reads the store directly so it isn't
/// subject to the history rate limit.
pub async fn list(config: &AppConfig, order: Order, limit: Option<usize>) -> Result<()> {
    let store = SqliteConversationStore::new(async_db(&config.db_path).await?);
    let messages = store.list(order, limit).await?;
    if messages.is_empty() {
        println!("No messages");
    }
    for msg in messages {
        println!(
            "[{}] #{} {}: {}",
            msg.timestamp.to_rfc3339(),
            msg.id,
            msg.role.as_str(),
            msg.content
        );
    }
    Ok(())
}

pub async fn clear(config: &AppConfig) -> Result<()> {
    let store = SqliteConversationStore::new(async_db(&config.db_path).await?);
    store.clear().await?;
    println!("Cleared conversation log");
    Ok(())
}

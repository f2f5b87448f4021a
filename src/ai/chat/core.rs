use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::cache::{MemoryReplyCache, ReplyCache, SqliteReplyCache};
use super::db::{ConversationStore, SqliteConversationStore, StoreError};
use super::limiter::{Clock, RateLimiter, RatePolicy, SystemClock};
use super::models::{ChatMessage, ChatOutcome, ChatRole, Cleared, Order, OutcomeStatus};
use super::validate::{DEFAULT_MAX_MESSAGE_LENGTH, validate};
use crate::ai::prompt::system_context;
use crate::core::{AppConfig, CacheBackend};
use crate::openai::{CompletionClient, CompletionError, OpenAiClient};

pub const THROTTLED_REPLY: &str = "Too many requests. Please wait a moment and try again.";
pub const UNAVAILABLE_REPLY: &str = "Something went wrong. Please try again later.";
pub const DEFAULT_FALLBACK_REPLY: &str = "Error connecting to AI";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("too many requests")]
    Throttled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The reply shown to the user for each kind of completion failure.
/// None of these ever include details of the failure itself.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackReplies {
    pub config: String,
    pub transport: String,
    pub malformed: String,
}

impl FallbackReplies {
    pub fn uniform(reply: &str) -> Self {
        Self {
            config: reply.to_string(),
            transport: reply.to_string(),
            malformed: reply.to_string(),
        }
    }

    pub fn for_error(&self, err: &CompletionError) -> &str {
        match err {
            CompletionError::Config(_) => &self.config,
            CompletionError::Transport(_) => &self.transport,
            CompletionError::MalformedResponse(_) => &self.malformed,
        }
    }
}

impl Default for FallbackReplies {
    fn default() -> Self {
        Self::uniform(DEFAULT_FALLBACK_REPLY)
    }
}

/// Relays a single user message to the completion service and logs
/// the exchange.
///
/// Every submitted message goes through the same pipeline:
/// - Rate limiting by client identity
/// - Validation and normalization
/// - Logging the user turn
/// - Reply cache lookup, falling back to the completion service
/// - Logging the assistant turn
///
/// Use `RelayBuilder` to construct a `ChatRelay`.
pub struct ChatRelay {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ConversationStore>,
    cache: Arc<dyn ReplyCache>,
    chat_limiter: Arc<RateLimiter>,
    history_limiter: Arc<RateLimiter>,
    system_context: String,
    max_message_length: usize,
    fallback: FallbackReplies,
}

impl ChatRelay {
    pub fn builder(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn ConversationStore>,
        system_context: &str,
    ) -> RelayBuilder {
        RelayBuilder::new(client, store, system_context)
    }

    /// Wire up the relay from config: OpenAI compatible client, SQLite
    /// conversation log and the configured cache backend.
    pub fn from_config(config: &AppConfig, db: Connection) -> Result<Self> {
        let client = OpenAiClient::new(
            &config.llm_api_hostname,
            config.llm_api_key.as_deref(),
            config.llm_model.as_deref(),
            config.llm_temperature,
            Duration::from_secs(config.llm_timeout_secs),
        );
        let cache: Arc<dyn ReplyCache> = match config.cache_backend {
            CacheBackend::Sqlite => Arc::new(SqliteReplyCache::new(db.clone())),
            CacheBackend::Memory => Arc::new(MemoryReplyCache::new()),
        };
        let store = Arc::new(SqliteConversationStore::new(db));
        let system = system_context(config)?;

        let relay = RelayBuilder::new(Arc::new(client), store, &system)
            .cache(cache)
            .chat_limit(RatePolicy::new(
                config.chat_rate_limit,
                Duration::from_secs(config.chat_rate_window_secs),
            ))
            .history_limit(RatePolicy::new(
                config.history_rate_limit,
                Duration::from_secs(config.history_rate_window_secs),
            ))
            .max_message_length(config.max_message_length)
            .fallback(FallbackReplies::uniform(&config.fallback_reply))
            .build();
        Ok(relay)
    }

    pub fn chat_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.chat_limiter)
    }

    pub fn history_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.history_limiter)
    }

    /// Handle one message from `identity`. Never fails; every outcome,
    /// including refusals and upstream failures, carries a reply.
    pub async fn submit_message(&self, identity: &str, raw: &str) -> ChatOutcome {
        if !self.chat_limiter.admit(identity) {
            return ChatOutcome::new(THROTTLED_REPLY, OutcomeStatus::Throttled);
        }

        let message = match validate(raw, self.max_message_length) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Rejected message from {}: {}", identity, e);
                return ChatOutcome::new(&e.to_string(), OutcomeStatus::Rejected);
            }
        };

        // The user turn is logged before anything else so it's
        // recorded even if the completion fails.
        if let Err(e) = self.store.append(ChatRole::User, &message).await {
            tracing::error!("Failed to log user message: {}", e);
            return ChatOutcome::new(UNAVAILABLE_REPLY, OutcomeStatus::Unavailable);
        }

        let (reply, status) = match self.cached_reply(&message).await {
            Some(reply) => (reply, OutcomeStatus::Cached),
            None => self.complete(&message).await,
        };

        if let Err(e) = self.store.append(ChatRole::Assistant, &reply).await {
            tracing::error!("Failed to log assistant message: {}", e);
        }

        ChatOutcome { reply, status }
    }

    // A broken cache shouldn't take the relay down with it so lookup
    // errors are treated as a miss.
    async fn cached_reply(&self, message: &str) -> Option<String> {
        match self.cache.lookup(message).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Reply cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn complete(&self, message: &str) -> (String, OutcomeStatus) {
        match self.client.complete(&self.system_context, message).await {
            Ok(reply) => {
                if let Err(e) = self.cache.store(message, &reply).await {
                    tracing::warn!("Failed to cache reply: {}", e);
                }
                (reply, OutcomeStatus::Replied)
            }
            Err(e) => {
                match &e {
                    CompletionError::Config(_) => tracing::error!("{}", e),
                    _ => tracing::warn!("{}", e),
                }
                (self.fallback.for_error(&e).to_string(), OutcomeStatus::Fallback)
            }
        }
    }

    /// Read the conversation log, throttled per identity.
    pub async fn list_messages(
        &self,
        identity: &str,
        order: Order,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, RelayError> {
        if !self.history_limiter.admit(identity) {
            return Err(RelayError::Throttled);
        }
        Ok(self.store.list(order, limit).await?)
    }

    /// Remove every logged message.
    pub async fn clear_messages(&self) -> Result<Cleared, RelayError> {
        self.store.clear().await?;
        tracing::info!("Cleared conversation log");
        Ok(Cleared::default())
    }
}

pub struct RelayBuilder {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ConversationStore>,
    system_context: String,
    cache: Option<Arc<dyn ReplyCache>>,
    chat_limit: RatePolicy,
    history_limit: RatePolicy,
    clock: Arc<dyn Clock>,
    max_message_length: usize,
    fallback: FallbackReplies,
}

impl RelayBuilder {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn ConversationStore>,
        system_context: &str,
    ) -> Self {
        Self {
            client,
            store,
            system_context: system_context.to_string(),
            cache: None,
            chat_limit: RatePolicy::cooldown(Duration::from_secs(3)),
            history_limit: RatePolicy::new(10, Duration::from_secs(60)),
            clock: Arc::new(SystemClock),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            fallback: FallbackReplies::default(),
        }
    }

    pub fn build(self) -> ChatRelay {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryReplyCache::new()));
        ChatRelay {
            client: self.client,
            store: self.store,
            cache,
            chat_limiter: Arc::new(RateLimiter::with_clock(self.chat_limit, self.clock.clone())),
            history_limiter: Arc::new(RateLimiter::with_clock(self.history_limit, self.clock)),
            system_context: self.system_context,
            max_message_length: self.max_message_length,
            fallback: self.fallback,
        }
    }

    pub fn cache(mut self, cache: Arc<dyn ReplyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn chat_limit(mut self, policy: RatePolicy) -> Self {
        self.chat_limit = policy;
        self
    }

    pub fn history_limit(mut self, policy: RatePolicy) -> Self {
        self.history_limit = policy;
        self
    }

    /// Time source for both rate limiters
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    pub fn fallback(mut self, fallback: FallbackReplies) -> Self {
        self.fallback = fallback;
        self
    }
}

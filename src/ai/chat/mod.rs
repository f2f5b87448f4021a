pub mod cache;
pub mod core;
pub mod db;
pub mod limiter;
pub mod models;
pub mod validate;

pub use cache::{MemoryReplyCache, ReplyCache, SqliteReplyCache};
pub use self::core::{ChatRelay, FallbackReplies, RelayBuilder, RelayError};
pub use db::{ConversationStore, SqliteConversationStore, StoreError};
pub use limiter::{Clock, RateLimiter, RatePolicy, SystemClock};
pub use models::{ChatMessage, ChatOutcome, ChatRole, Cleared, Order, OutcomeStatus};
pub use validate::{ValidationError, validate};

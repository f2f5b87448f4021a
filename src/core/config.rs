use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub enum CacheBackend {
    Sqlite,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(CacheBackend::Sqlite),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown cache backend: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub llm_api_hostname: String,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_temperature: f32,
    pub llm_timeout_secs: u64,
    pub chat_rate_limit: usize,
    pub chat_rate_window_secs: u64,
    pub history_rate_limit: usize,
    pub history_rate_window_secs: u64,
    pub max_message_length: usize,
    pub cache_backend: CacheBackend,
    pub fallback_reply: String,
    pub persona_name: String,
    pub resume_path: Option<String>,
    pub system_message: Option<String>,
    /// Use `X-Forwarded-For` for the client identity. Only enable
    /// this when a proxy you control sets the header.
    pub trust_forwarded_for: bool,
}

// Unset and blank values are treated the same
fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    match optional_var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", key, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    /// Read the config from `RELAY_*` environment variables, using
    /// defaults for anything that isn't set. A missing API key or
    /// model is allowed here and reported per request instead.
    pub fn from_env() -> Self {
        let storage_path = env::var("RELAY_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/relay.db", storage_path.trim_end_matches('/'));
        let llm_api_hostname = env::var("RELAY_LLM_HOST")
            .unwrap_or_else(|_| "https://api.groq.com/openai".to_string());
        let llm_api_key =
            optional_var("RELAY_LLM_API_KEY").or_else(|| optional_var("GROQ_API_KEY"));
        let llm_model = match env::var("RELAY_LLM_MODEL") {
            Ok(model) if model.trim().is_empty() => None,
            Ok(model) => Some(model),
            Err(_) => Some("llama-3.1-8b-instant".to_string()),
        };
        let cache_backend = optional_var("RELAY_CACHE_BACKEND")
            .map(|raw| {
                raw.parse().unwrap_or_else(|e| {
                    tracing::warn!("{}, falling back to sqlite", e);
                    CacheBackend::Sqlite
                })
            })
            .unwrap_or(CacheBackend::Sqlite);

        Self {
            storage_path,
            db_path,
            llm_api_hostname,
            llm_api_key,
            llm_model,
            llm_temperature: parsed_var("RELAY_LLM_TEMPERATURE", 0.2),
            llm_timeout_secs: parsed_var("RELAY_LLM_TIMEOUT_SECS", 60),
            chat_rate_limit: parsed_var("RELAY_CHAT_RATE_LIMIT", 1),
            chat_rate_window_secs: parsed_var("RELAY_CHAT_RATE_WINDOW_SECS", 3),
            history_rate_limit: parsed_var("RELAY_HISTORY_RATE_LIMIT", 10),
            history_rate_window_secs: parsed_var("RELAY_HISTORY_RATE_WINDOW_SECS", 60),
            max_message_length: parsed_var("RELAY_MAX_MESSAGE_LENGTH", 500),
            cache_backend,
            fallback_reply: env::var("RELAY_FALLBACK_REPLY")
                .unwrap_or_else(|_| "Error connecting to AI".to_string()),
            persona_name: env::var("RELAY_PERSONA_NAME")
                .unwrap_or_else(|_| "the portfolio owner".to_string()),
            resume_path: optional_var("RELAY_RESUME_PATH"),
            system_message: optional_var("RELAY_SYSTEM_MESSAGE"),
            trust_forwarded_for: parsed_var("RELAY_TRUST_FORWARDED_FOR", false),
        }
    }
}

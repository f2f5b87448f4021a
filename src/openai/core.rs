use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message>,
}

// Only the fields we read are declared. Anything else the provider
// sends back is ignored, but a missing `choices`, `message` or
// `content` fails the decode.
#[derive(Deserialize, Debug)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion client is not configured: {0}")]
    Config(String),
    #[error("request to completion service failed: {0}")]
    Transport(String),
    #[error("completion service returned an unexpected response: {0}")]
    MalformedResponse(String),
}

/// Anything that can turn a system context and a single user message
/// into a reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

/// Client for any OpenAI compatible chat completions API (OpenAI,
/// Groq, llama.cpp, etc).
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_hostname: String,
    api_key: Option<String>,
    model: Option<String>,
    temperature: f32,
    timeout: Duration,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_hostname: &str,
        api_key: Option<&str>,
        model: Option<&str>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.map(str::to_string),
            model: model.map(str::to_string),
            temperature,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Config("missing API key".to_string()))?;
        let model = self
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| CompletionError::Config("missing model identifier".to_string()))?;
        Ok((api_key, model))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let (api_key, model) = self.credentials()?;
        let payload = CompletionRequest {
            model,
            temperature: self.temperature,
            messages: vec![Message::new(Role::System, system), Message::new(Role::User, user)],
        };
        let url = format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(CompletionError::Transport(format!(
                "status {}: {}",
                status, body
            )));
        }

        parse_completion(&body)
    }
}

fn transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Transport(format!("timed out: {}", err))
    } else {
        CompletionError::Transport(err.to_string())
    }
}

/// Decode a successful response body and pull out the first choice.
pub fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let resp: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(format!("{}: {}", e, body)))?;
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::MalformedResponse(format!("empty choices: {}", body)))?;
    Ok(choice.message.content.trim().to_string())
}

//! OpenAI-compatible chat-completions clients
//!
//! `OpenAiChat` is the minimal wire client. `OpenAiReasoner` layers the
//! decision prompts on top of it to implement the Reasoner trait; the decide
//! stage borrows the same client for its adjudication call, so one endpoint,
//! model, and key serve both.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::domain::{Decision, StepRecord};
use crate::error::{ClaimflowError, Result};
use crate::reasoner::client::{ClaimSummary, Reasoner};
use crate::reasoner::parse::parse_decision;
use crate::reasoner::prompt::{SYSTEM_PROMPT, render_user_prompt};

/// Default chat-completions endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model to use
const DEFAULT_MODEL: &str = "gpt-4";

/// Default sampling temperature; adjudication wants determinism
const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Configuration for the chat-completions clients
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Minimal chat-completions client.
///
/// Carries no prompting of its own; callers hand it a system and user
/// message and get the assistant's text back. Errors stay neutral (`Http`,
/// `Api`) so each caller can classify failures for its own contract.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiChat {
    /// Create a client, reading OPENAI_API_KEY from the environment
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ClaimflowError::Config("OPENAI_API_KEY not set".to_string()))?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClaimflowError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Send one exchange and return the assistant's text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.build_request(system, user);
        let response = self.send(body).await?;
        Self::content_of(response)
    }

    /// Build the request body; an empty system prompt is omitted
    fn build_request(&self, system: &str, user: &str) -> Value {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
        })
    }

    /// Pull the assistant's text out of an API response
    fn content_of(body: Value) -> Result<String> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClaimflowError::Api {
                status: 200,
                message: "chat reply carried no content".to_string(),
            })
    }

    async fn send(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ClaimflowError::Api {
                status: 429,
                message: format!("rate limited, retry after {retry_after} seconds"),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClaimflowError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Reasoner over the chat-completions wire format; any compatible endpoint
/// can serve as the oracle. Every chat failure surfaces as a reasoning
/// error, since an unreachable or broken oracle cannot produce a decision.
pub struct OpenAiReasoner {
    chat: Arc<OpenAiChat>,
}

impl OpenAiReasoner {
    /// Create a reasoner, reading OPENAI_API_KEY from the environment
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        Ok(Self {
            chat: Arc::new(OpenAiChat::new(config)?),
        })
    }

    /// Create a reasoner with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self> {
        Ok(Self {
            chat: Arc::new(OpenAiChat::with_api_key(api_key, config)?),
        })
    }

    /// Share an existing chat client
    pub fn from_chat(chat: Arc<OpenAiChat>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn decide(&self, summary: &ClaimSummary, history: &[StepRecord]) -> Result<Decision> {
        let user = render_user_prompt(summary, history);
        let content = self
            .chat
            .complete(SYSTEM_PROMPT, &user)
            .await
            .map_err(|e| ClaimflowError::Reasoning(format!("oracle request failed: {e}")))?;

        parse_decision(&content)
    }
}

impl std::fmt::Debug for OpenAiReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiReasoner").field("chat", &self.chat).finish()
    }
}

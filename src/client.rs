//! Provider-agnostic chat client interface and factory.

use crate::cohere::CohereClient;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::memory::InteractionRecord;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiCompatibleClient;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One earlier exchange, replayed to the provider as chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

impl From<&InteractionRecord> for ChatTurn {
    fn from(record: &InteractionRecord) -> Self {
        Self {
            user: record.user_input.clone(),
            assistant: record.assistant_response.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    /// Oldest first
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Send one request and return the assistant's reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Models the provider offers. Never fails; falls back to the static list.
    async fn list_models(&self) -> Vec<String>;
}

pub(crate) fn static_models(provider: Provider) -> Vec<String> {
    provider
        .available_models()
        .iter()
        .map(|m| m.to_string())
        .collect()
}

pub fn build_http_client(settings: &Settings) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .build()?)
}

/// Build the client for `provider` from the current settings.
pub fn create_client(provider: Provider, settings: &Settings) -> Result<Box<dyn LlmClient>> {
    let http = build_http_client(settings)?;
    let base_url = settings.base_url_for(provider).to_string();

    if provider == Provider::Ollama {
        return Ok(Box::new(OllamaClient::new(http, &base_url)));
    }

    let api_key = settings
        .api_key(provider)
        .ok_or(Error::MissingApiKey { provider })?;

    let client: Box<dyn LlmClient> = match provider {
        Provider::Cohere => Box::new(CohereClient::new(http, &base_url, api_key)),
        _ => Box::new(OpenAiCompatibleClient::new(provider, http, &base_url, api_key)),
    };
    Ok(client)
}

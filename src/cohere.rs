use crate::client::{static_models, ChatRequest, LlmClient};
use crate::error::{Error, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CohereMessage {
    pub role: String, // "USER" | "CHATBOT"
    pub message: String,
}

#[derive(Debug, Serialize)]
struct CohereChatRequest {
    model: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat_history: Vec<CohereMessage>,
    preamble: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CohereError {
    message: String,
}

/// Convert earlier turns to Cohere's chat history (oldest first).
pub fn convert_history(request: &ChatRequest) -> Vec<CohereMessage> {
    request
        .history
        .iter()
        .flat_map(|turn| {
            [
                CohereMessage {
                    role: "USER".to_string(),
                    message: turn.user.clone(),
                },
                CohereMessage {
                    role: "CHATBOT".to_string(),
                    message: turn.assistant.clone(),
                },
            ]
        })
        .collect()
}

pub struct CohereClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CohereClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for CohereClient {
    fn provider(&self) -> Provider {
        Provider::Cohere
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = CohereChatRequest {
            model: request.model.clone(),
            message: request.message.clone(),
            chat_history: convert_history(request),
            preamble: request.system_prompt.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<CohereError>(&error_text)
                .map(|e| e.message)
                .unwrap_or(error_text);

            return Err(Error::Api {
                provider: Provider::Cohere,
                status: status.as_u16(),
                message,
            });
        }

        let reply: CohereChatResponse = response.json().await?;
        reply.text.ok_or(Error::EmptyResponse {
            provider: Provider::Cohere,
        })
    }

    // No models endpoint worth calling
    async fn list_models(&self) -> Vec<String> {
        static_models(Provider::Cohere)
    }
}

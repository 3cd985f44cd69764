//! OpenAI-compatible chat completions client (Groq, GLHF, OpenRouter).

use crate::client::{static_models, ChatRequest, LlmClient};
use crate::error::{Error, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENROUTER_REFERER: &str = "https://github.com/floatball/floatball";
const OPENROUTER_TITLE: &str = "Floatball Assistant";

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

/// System prompt, then earlier turns oldest first, then the new user message.
pub fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() * 2 + 2);
    messages.push(ChatMessage::new("system", &request.system_prompt));
    for turn in &request.history {
        messages.push(ChatMessage::new("user", &turn.user));
        messages.push(ChatMessage::new("assistant", &turn.assistant));
    }
    messages.push(ChatMessage::new("user", &request.message));
    messages
}

pub struct OpenAiCompatibleClient {
    provider: Provider,
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(provider: Provider, client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            provider,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json");

        if self.provider == Provider::OpenRouter {
            builder
                .header("HTTP-Referer", OPENROUTER_REFERER)
                .header("X-Title", OPENROUTER_TITLE)
        } else {
            builder
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .authorized(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            // Try to parse structured error
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            return Err(Error::Api {
                provider: self.provider,
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(Error::EmptyResponse {
                provider: self.provider,
            })
    }

    async fn list_models(&self) -> Vec<String> {
        let response = self
            .authorized(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await;

        let models = match response {
            Ok(r) if r.status().is_success() => r
                .json::<ModelList>()
                .await
                .map(|list| list.data.into_iter().map(|m| m.id).collect::<Vec<_>>())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        if models.is_empty() {
            static_models(self.provider)
        } else {
            models
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatTurn;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3-70b-8192".to_string(),
            system_prompt: "be nice".to_string(),
            history: vec![ChatTurn {
                user: "hi".to_string(),
                assistant: "hello".to_string(),
            }],
            message: "how are you?".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }

    #[test]
    fn test_build_messages_order() {
        let roles: Vec<String> = build_messages(&request()).into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn test_complete_sends_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer gsk-test"))
            .and(body_json(json!({
                "model": "llama3-70b-8192",
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "how are you?"}
                ],
                "temperature": 0.7,
                "max_tokens": 4096
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Great, thanks!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::Groq, Client::new(), &server.uri(), "gsk-test");
        let reply = client.complete(&request()).await.unwrap();
        assert_eq!(reply, "Great, thanks!");
    }

    #[tokio::test]
    async fn test_openrouter_sends_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("HTTP-Referer", OPENROUTER_REFERER))
            .and(header("X-Title", OPENROUTER_TITLE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::OpenRouter, Client::new(), &server.uri(), "sk-or");
        assert_eq!(client.complete(&request()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_structured_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API Key", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::Groq, Client::new(), &server.uri(), "bad");
        match client.complete(&request()).await {
            Err(Error::Api { provider, status, message }) => {
                assert_eq!(provider, Provider::Groq);
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::Glhf, Client::new(), &server.uri(), "k");
        assert!(matches!(
            client.complete(&request()).await,
            Err(Error::EmptyResponse { provider: Provider::Glhf })
        ));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "llama-3.1-8b-instant"}, {"id": "gemma2-9b-it"}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::Groq, Client::new(), &server.uri(), "k");
        assert_eq!(client.list_models().await, vec!["llama-3.1-8b-instant", "gemma2-9b-it"]);
    }

    #[tokio::test]
    async fn test_list_models_falls_back_to_static_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(Provider::Groq, Client::new(), &server.uri(), "k");
        assert_eq!(client.list_models().await, static_models(Provider::Groq));
    }
}

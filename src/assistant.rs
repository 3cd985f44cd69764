//! Message pipeline: topic, prompt, history, provider call, memory write.

use crate::client::{create_client, ChatRequest, ChatTurn, LlmClient, DEFAULT_TEMPERATURE};
use crate::config::Settings;
use crate::db::SqliteStore;
use crate::error::{Error, Result};
use crate::logging;
use crate::memory::{InMemoryStore, MemoryManager};
use crate::prompt::PromptAssembler;
use crate::topic::TopicExtractor;
use std::sync::Arc;
use uuid::Uuid;

pub struct Assistant {
    settings: Settings,
    memory: Arc<dyn MemoryManager>,
    topics: TopicExtractor,
}

impl Assistant {
    pub fn new(settings: Settings, memory: Arc<dyn MemoryManager>) -> Self {
        Self {
            settings,
            memory,
            topics: TopicExtractor::default(),
        }
    }

    /// Pick the memory backend from settings: SQLite when a path is configured.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let memory: Arc<dyn MemoryManager> = match &settings.memory_db_path {
            Some(path) => {
                logging::log_memory(None, &format!("Using SQLite memory at {}", path.display()));
                Arc::new(SqliteStore::open(path, settings.memory)?)
            }
            None => Arc::new(InMemoryStore::with_config(settings.memory)),
        };
        Ok(Self::new(settings, memory))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn memory(&self) -> &Arc<dyn MemoryManager> {
        &self.memory
    }

    pub fn new_session(&self) -> Uuid {
        let session_id = Uuid::new_v4();
        logging::log_session(Some(session_id), "Started new session");
        session_id
    }

    /// Send `message` to the selected provider, using `model` if given.
    pub async fn send_message(&self, session_id: Uuid, message: &str, model: Option<&str>) -> Result<String> {
        let client = create_client(self.settings.provider, &self.settings)?;
        self.send_message_with(client.as_ref(), session_id, message, model).await
    }

    pub async fn send_message_with(
        &self,
        client: &dyn LlmClient,
        session_id: Uuid,
        message: &str,
        model: Option<&str>,
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let provider = client.provider();
        let topic = self.topics.extract(message);

        let mut assembler = PromptAssembler::new(self.memory.clone()).with_provider(provider);
        if let Some(instructions) = &self.settings.custom_instructions {
            assembler = assembler.with_custom_instructions(instructions);
        }
        let system_prompt = assembler.build(session_id)?;

        let history = if self.settings.use_memory {
            let mut recent = self.memory.get_recent(session_id, self.settings.memory_limit)?;
            recent.reverse();
            recent.iter().map(ChatTurn::from).collect()
        } else {
            Vec::new()
        };

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.settings.model_for(provider))
            .to_string();

        let request = ChatRequest {
            model,
            system_prompt,
            history,
            message: message.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: provider.max_tokens(),
        };

        logging::log_provider(
            Some(session_id),
            &format!(
                "Sending to {} ({}), topic '{}', {} history turns",
                provider,
                request.model,
                topic,
                request.history.len()
            ),
        );

        let reply = match client.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                logging::log_error(Some(session_id), &format!("{} request failed: {}", provider, e));
                return Err(e);
            }
        };

        if self.settings.use_memory {
            self.memory.save(session_id, &topic, message, &reply)?;
        }

        Ok(reply)
    }

    /// Models for the selected provider; the static list if no client can be built.
    pub async fn available_models(&self) -> Vec<String> {
        let provider = self.settings.provider;
        match create_client(provider, &self.settings) {
            Ok(client) => client.list_models().await,
            Err(_) => crate::client::static_models(provider),
        }
    }
}

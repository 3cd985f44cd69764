//! System prompt assembly
//!
//! The prompt is an opaque instruction blob: a fixed template with the current
//! date and time, either first-conversation guidance or the recent history of
//! the session, the provider capability sentence, and any custom instructions.

use crate::error::Result;
use crate::logging;
use crate::memory::{InteractionRecord, MemoryManager};
use crate::provider::Provider;
use chrono::{DateTime, Local};
use std::sync::Arc;
use uuid::Uuid;

pub const BASE_PROMPT: &str = r#"You are a helpful assistant that lives in a small floating ball on the user's desktop. The user clicks the ball, types a message, and reads your reply in a popup.

The current date and time is {{current_day_of_week}}, {{current_date}}, {{current_time}}.

You have a long-term episodic memory of previous exchanges with this user. When drawing on past conversations, do so naturally and only when it helps, for example:
- 'As we discussed last time...'
- 'Building on what you mentioned about...'

Guidelines:
- Be concise but helpful.
- Format code with markdown triple backticks and a language tag (```language).
- Include examples when they make an answer clearer.
- When uncertain, say so instead of guessing."#;

pub const NEW_CONVERSATION_GUIDANCE: &str = "This is a new conversation. Introduce yourself naturally and warmly, without explicitly mentioning your memory capabilities. Simply be thoughtful and helpful.";

pub const HISTORY_HEADER: &str = "CONVERSATION HISTORY (Reference only - you already know these details through your memory system):";

pub const THEMES_PREFIX: &str = "Key themes in your conversation history: ";

pub struct PromptAssembler {
    memory: Arc<dyn MemoryManager>,
    provider: Option<Provider>,
    custom_instructions: Option<String>,
    /// Records rendered into the history section
    pub history_limit: usize,
    pub max_themes: usize,
}

impl PromptAssembler {
    pub fn new(memory: Arc<dyn MemoryManager>) -> Self {
        Self {
            memory,
            provider: None,
            custom_instructions: None,
            history_limit: 5,
            max_themes: 3,
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Free-text variant; names that match no provider add nothing.
    pub fn with_provider_name(mut self, name: &str) -> Self {
        self.provider = name.parse().ok();
        self
    }

    pub fn with_custom_instructions(mut self, instructions: &str) -> Self {
        if !instructions.is_empty() {
            self.custom_instructions = Some(instructions.to_string());
        }
        self
    }

    pub fn build(&self, session_id: Uuid) -> Result<String> {
        self.build_at(session_id, Local::now())
    }

    pub fn build_at(&self, session_id: Uuid, now: DateTime<Local>) -> Result<String> {
        let mut prompt = render_template(BASE_PROMPT, now);

        if self.memory.has_previous(session_id)? {
            let recent = self.memory.get_recent(session_id, self.history_limit)?;
            if !recent.is_empty() {
                prompt.push_str("\n\n");
                prompt.push_str(HISTORY_HEADER);
                prompt.push('\n');
                for record in &recent {
                    prompt.push_str(&record.to_prompt_format());
                    prompt.push('\n');
                }

                let themes = key_themes(&recent, self.max_themes);
                prompt.push('\n');
                prompt.push_str(THEMES_PREFIX);
                prompt.push_str(&themes.join(", "));
                prompt.push('\n');
            }
            logging::log_prompt(
                Some(session_id),
                &format!("Injected {} history records", recent.len()),
            );
        } else {
            prompt.push_str("\n\n");
            prompt.push_str(NEW_CONVERSATION_GUIDANCE);
            prompt.push('\n');
        }

        if let Some(capabilities) = self.provider.and_then(|p| p.capabilities()) {
            prompt.push_str("\n\n");
            prompt.push_str(capabilities);
        }

        if let Some(instructions) = &self.custom_instructions {
            prompt.push_str("\n\n");
            prompt.push_str(instructions);
        }

        Ok(prompt)
    }
}

/// Fill the date/time placeholders, e.g. `Tuesday`, `March 5, 2024`, `2:07 PM`.
pub fn render_template(template: &str, now: DateTime<Local>) -> String {
    template
        .replace("{{current_day_of_week}}", &now.format("%A").to_string())
        .replace("{{current_date}}", &now.format("%B %-d, %Y").to_string())
        .replace("{{current_time}}", &now.format("%-I:%M %p").to_string())
}

/// Distinct topics in first-encountered order. An empty topic counts as one.
fn key_themes(records: &[InteractionRecord], max: usize) -> Vec<&str> {
    let mut themes: Vec<&str> = Vec::new();
    for record in records {
        let topic = record.topic.as_str();
        if !themes.contains(&topic) {
            themes.push(topic);
            if themes.len() == max {
                break;
            }
        }
    }
    themes
}

pub mod assistant;
pub mod client;
mod cohere;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod memory;
mod ollama;
mod openai;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod topic;

pub use assistant::Assistant;
pub use client::{create_client, ChatRequest, ChatTurn, LlmClient};
pub use config::Settings;
pub use db::SqliteStore;
pub use error::{Error, Result};
pub use memory::{EvictionScope, InMemoryStore, InteractionRecord, MemoryConfig, MemoryManager};
pub use prompt::PromptAssembler;
pub use provider::Provider;
pub use topic::{extract_topic, TopicExtractor};

use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

// ============ Terminal Commands ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Provider(String),
    Model(String),
    Models,
    Key { provider: String, key: String },
    New,
    Help,
    Quit,
    Message(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        if !line.starts_with('/') {
            return Command::Message(line.to_string());
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        match name {
            "/provider" => Command::Provider(rest.to_string()),
            "/model" => Command::Model(rest.to_string()),
            "/models" => Command::Models,
            "/key" => {
                let mut args = rest.splitn(2, char::is_whitespace);
                Command::Key {
                    provider: args.next().unwrap_or_default().to_string(),
                    key: args.next().unwrap_or_default().trim().to_string(),
                }
            }
            "/new" => Command::New,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Message(line.to_string()),
        }
    }
}

const HELP: &str = "Commands:
  /provider <name>       select groq, glhf, openrouter, cohere or ollama
  /model <name>          use a specific model (empty resets to the default)
  /models                list models for the current provider
  /key <provider> <key>  set an API key (empty key removes it)
  /new                   start a new session
  /quit                  exit";

/// Apply a settings command and return the text to show. Messages and
/// session/exit commands are handled by the caller.
pub fn apply_command(settings: &mut Settings, command: &Command) -> Result<String> {
    match command {
        Command::Provider(name) => {
            let provider: Provider = name.parse()?;
            settings.select_provider(provider);
            let mut reply = format!("Provider set to {} ({})", provider, settings.model_for(provider));
            if !settings.has_api_key(provider) {
                reply.push_str(&format!(
                    "\nNo API key configured. Use /key {} <key>",
                    name.to_lowercase()
                ));
            }
            Ok(reply)
        }
        Command::Model(model) => {
            settings.select_model(model);
            Ok(format!("Model set to {}", settings.model_for(settings.provider)))
        }
        Command::Key { provider, key } => {
            let provider: Provider = provider.parse()?;
            settings.set_api_key(provider, key);
            Ok(if settings.api_key(provider).is_some() {
                format!("{} API key saved", provider)
            } else {
                format!("{} API key removed", provider)
            })
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Models | Command::New | Command::Quit | Command::Message(_) => Ok(String::new()),
    }
}

// ============ Run ============

pub async fn run() -> Result<()> {
    let settings = Settings::from_env()?;

    if let Err(e) = logging::init_logging(&settings.log_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    // Keep the last 7 days of logs
    let _ = logging::cleanup_old_logs(&settings.log_dir, 7);

    let mut assistant = Assistant::from_settings(settings)?;
    let mut session_id: Uuid = assistant.new_session();

    println!(
        "Floatball ({} / {}). Type /help for commands.",
        assistant.settings().provider,
        assistant.settings().model_for(assistant.settings().provider)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Command::Quit => break,
            Command::New => {
                session_id = assistant.new_session();
                println!("Started a new conversation.");
            }
            Command::Models => {
                for model in assistant.available_models().await {
                    println!("  {}", model);
                }
            }
            Command::Message(message) => {
                match assistant.send_message(session_id, &message, None).await {
                    Ok(reply) => println!("{}", render::to_terminal(&render::parse_response(&reply))),
                    Err(e) => println!("Error: {}", e),
                }
            }
            command => match apply_command(assistant.settings_mut(), &command) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("Error: {}", e),
            },
        }
    }

    logging::log_session(Some(session_id), "Exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/provider cohere"), Command::Provider("cohere".to_string()));
        assert_eq!(Command::parse("/model"), Command::Model(String::new()));
        assert_eq!(Command::parse("/models"), Command::Models);
        assert_eq!(
            Command::parse("/key groq  gsk-123 "),
            Command::Key {
                provider: "groq".to_string(),
                key: "gsk-123".to_string(),
            }
        );
        assert_eq!(Command::parse("/new"), Command::New);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("  hello  "), Command::Message("hello".to_string()));
        assert_eq!(Command::parse("/shrug"), Command::Message("/shrug".to_string()));
    }

    #[test]
    fn test_apply_provider_and_key() {
        let mut settings = Settings::default();

        let reply = apply_command(&mut settings, &Command::Provider("cohere".to_string())).unwrap();
        assert_eq!(settings.provider, Provider::Cohere);
        assert!(reply.contains("No API key configured"));

        apply_command(
            &mut settings,
            &Command::Key {
                provider: "cohere".to_string(),
                key: "co-key".to_string(),
            },
        )
        .unwrap();
        assert_eq!(settings.api_key(Provider::Cohere), Some("co-key"));

        let reply = apply_command(&mut settings, &Command::Provider("ollama".to_string())).unwrap();
        assert!(!reply.contains("No API key"));
    }

    #[test]
    fn test_apply_model_and_errors() {
        let mut settings = Settings::default();
        apply_command(&mut settings, &Command::Model("gemma2-9b-it".to_string())).unwrap();
        assert_eq!(settings.model_for(Provider::Groq), "gemma2-9b-it");

        assert!(matches!(
            apply_command(&mut settings, &Command::Provider("nope".to_string())),
            Err(Error::UnknownProvider(_))
        ));
    }
}

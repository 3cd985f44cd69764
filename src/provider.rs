//! Supported LLM providers and their static metadata.
//!
//! Every per-provider constant (endpoint, models, capability sentence, key
//! variable) lives in one lookup table here instead of being matched on
//! free-text names at each call site.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Glhf,
    OpenRouter,
    Cohere,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Groq,
        Provider::Glhf,
        Provider::OpenRouter,
        Provider::Cohere,
        Provider::Ollama,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::Glhf => "GLHF",
            Provider::OpenRouter => "OpenRouter",
            Provider::Cohere => "Cohere",
            Provider::Ollama => "Ollama",
        }
    }

    /// One sentence describing where the model is running, appended to the system prompt.
    /// Ollama has none.
    pub fn capabilities(&self) -> Option<&'static str> {
        let sentence = match self {
            Provider::Groq => "You are running on Groq hardware, optimized for extremely fast inference. This allows you to provide near-instantaneous responses while maintaining high quality thinking.",
            Provider::Glhf => "You are running on GLHF hardware, an advanced platform for high-performance AI inference. Your responses will be fast and thoughtful.",
            Provider::OpenRouter => "You are running via OpenRouter, which provides access to multiple large language models. Your responses should be thoughtful and nuanced.",
            Provider::Cohere => "You are running on Cohere's infrastructure, with particular strengths in semantic understanding, reasoning, and natural language processing. Your responses will be contextually rich and insightful.",
            Provider::Ollama => return None,
        };
        Some(sentence)
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Glhf => "https://api.glhf.ai/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Cohere => "https://api.cohere.ai/v1",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Groq => "llama3-70b-8192",
            Provider::Glhf => "llama3-70b",
            Provider::OpenRouter => "openai/gpt-4",
            Provider::Cohere => "command-r-plus",
            Provider::Ollama => "deepseek-r1:1.5b",
        }
    }

    /// Fallback model list used when the provider cannot be asked.
    pub fn available_models(&self) -> &'static [&'static str] {
        match self {
            Provider::Groq => &[
                "llama3-70b-8192",
                "llama3-8b-8192",
                "mixtral-8x7b-32768",
                "gemma-7b-it",
            ],
            Provider::Glhf => &[
                "hf:NousResearch/Nous-Hermes-2-Mixtral-8x7B-DPO",
                "hf:meta-llama/Meta-Llama-3.1-405B-Instruct",
                "hf:Qwen/Qwen1.5-110B-Chat",
                "hf:google/gemma-2-9b-it",
            ],
            Provider::OpenRouter => &[
                "google/gemma-2-9b-it:free",
                "meta-llama/llama-3-8b-instruct:free",
                "qwen/qwen-2-7b-instruct:free",
                "nousresearch/hermes-3-llama-3.1-405b",
            ],
            Provider::Cohere => &["command-r-plus", "command-r", "command-light"],
            Provider::Ollama => &[],
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            Provider::Groq => 4096,
            _ => 2048,
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::Glhf => Some("GLHF_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Cohere => Some("COHERE_API_KEY"),
            Provider::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "glhf" => Ok(Provider::Glhf),
            "openrouter" | "open_router" | "open-router" => Ok(Provider::OpenRouter),
            "cohere" => Ok(Provider::Cohere),
            "ollama" => Ok(Provider::Ollama),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}

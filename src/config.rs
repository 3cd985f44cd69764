//! Settings: API keys, provider/model selection and memory knobs.
//!
//! `Settings` is the state behind the settings panel. It is an explicit value
//! handed to `Assistant` and the client factory; nothing here is global and
//! nothing is written back to disk.

use crate::error::{Error, Result};
use crate::logging;
use crate::memory::{EvictionScope, MemoryConfig};
use crate::provider::Provider;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    api_keys: HashMap<Provider, String>,
    models: HashMap<Provider, String>,
    pub provider: Provider,
    /// Send recent exchanges along with each request and record new ones
    pub use_memory: bool,
    /// How many past exchanges go into the request history
    pub memory_limit: usize,
    pub memory: MemoryConfig,
    pub custom_instructions: Option<String>,
    pub ollama_base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// When set, memory is kept in SQLite at this path instead of in process memory
    pub memory_db_path: Option<PathBuf>,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: HashMap::new(),
            models: HashMap::new(),
            provider: Provider::Groq,
            use_memory: true,
            memory_limit: 10,
            memory: MemoryConfig::default(),
            custom_instructions: None,
            ollama_base_url: Provider::Ollama.base_url().to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            memory_db_path: None,
            log_dir: logging::default_log_dir(),
        }
    }
}

impl Settings {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Settings::default();

        for provider in Provider::ALL {
            if let Some(key) = provider.api_key_env().and_then(|var| get(var)) {
                settings.api_keys.insert(provider, key);
            }
        }

        if let Some(name) = get("FLOATBALL_PROVIDER") {
            settings.provider = name.parse()?;
        }
        if let Some(model) = get("FLOATBALL_MODEL") {
            settings.models.insert(settings.provider, model);
        }
        if let Some(value) = get("FLOATBALL_USE_MEMORY") {
            settings.use_memory = parse_bool("FLOATBALL_USE_MEMORY", &value)?;
        }
        if let Some(value) = get("FLOATBALL_MEMORY_LIMIT") {
            settings.memory_limit = parse_number("FLOATBALL_MEMORY_LIMIT", &value)?;
        }
        if let Some(value) = get("FLOATBALL_MEMORY_CAPACITY") {
            let capacity: usize = parse_number("FLOATBALL_MEMORY_CAPACITY", &value)?;
            if capacity == 0 {
                return Err(Error::Config("FLOATBALL_MEMORY_CAPACITY must be at least 1".to_string()));
            }
            settings.memory.capacity = capacity;
        }
        if let Some(value) = get("FLOATBALL_EVICTION") {
            settings.memory.eviction = value
                .parse::<EvictionScope>()
                .map_err(|_| Error::Config(format!("FLOATBALL_EVICTION: unknown scope '{}'", value)))?;
        }
        if let Some(path) = get("FLOATBALL_MEMORY_DB") {
            settings.memory_db_path = Some(PathBuf::from(path));
        }
        settings.custom_instructions = get("FLOATBALL_CUSTOM_INSTRUCTIONS");
        if let Some(url) = get("OLLAMA_BASE_URL") {
            settings.ollama_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = get("FLOATBALL_LOG_DIR") {
            settings.log_dir = PathBuf::from(dir);
        }

        Ok(settings)
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.api_keys.get(&provider).map(String::as_str)
    }

    /// Store a key for `provider`; an empty key clears it.
    pub fn set_api_key(&mut self, provider: Provider, api_key: &str) {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            self.clear_api_key(provider);
        } else {
            self.api_keys.insert(provider, api_key.to_string());
            logging::log_session(None, &format!("Updated {} API key", provider));
        }
    }

    pub fn clear_api_key(&mut self, provider: Provider) {
        if self.api_keys.remove(&provider).is_some() {
            logging::log_session(None, &format!("Removed {} API key", provider));
        }
    }

    pub fn has_api_key(&self, provider: Provider) -> bool {
        !provider.requires_api_key() || self.api_keys.contains_key(&provider)
    }

    pub fn select_provider(&mut self, provider: Provider) {
        self.provider = provider;
        logging::log_session(None, &format!("Selected provider {}", provider));
    }

    /// Override the model for the current provider
    pub fn select_model(&mut self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            self.models.remove(&self.provider);
        } else {
            self.models.insert(self.provider, model.to_string());
        }
    }

    pub fn model_for(&self, provider: Provider) -> &str {
        self.models
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.default_model())
    }

    pub fn base_url_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::Ollama => &self.ollama_base_url,
            other => other.base_url(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}: expected a boolean, got '{}'", key, value))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{}: expected a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings.provider, Provider::Groq);
        assert!(settings.use_memory);
        assert_eq!(settings.memory_limit, 10);
        assert_eq!(settings.memory.capacity, 100);
        assert_eq!(settings.memory.eviction, EvictionScope::Global);
        assert_eq!(settings.model_for(Provider::Cohere), "command-r-plus");
        assert_eq!(settings.base_url_for(Provider::Ollama), "http://localhost:11434");
        assert!(settings.api_key(Provider::Groq).is_none());
        assert!(settings.memory_db_path.is_none());
    }

    #[test]
    fn test_reads_keys_and_knobs() {
        let settings = load(&[
            ("GROQ_API_KEY", "gsk-test"),
            ("COHERE_API_KEY", "  "),
            ("FLOATBALL_PROVIDER", "openrouter"),
            ("FLOATBALL_MODEL", "qwen/qwen-2-7b-instruct:free"),
            ("FLOATBALL_USE_MEMORY", "off"),
            ("FLOATBALL_MEMORY_LIMIT", "4"),
            ("FLOATBALL_MEMORY_CAPACITY", "20"),
            ("FLOATBALL_EVICTION", "per_session"),
            ("OLLAMA_BASE_URL", "http://gpu-box:11434/"),
        ])
        .unwrap();

        assert_eq!(settings.api_key(Provider::Groq), Some("gsk-test"));
        assert_eq!(settings.api_key(Provider::Cohere), None);
        assert_eq!(settings.provider, Provider::OpenRouter);
        assert_eq!(settings.model_for(Provider::OpenRouter), "qwen/qwen-2-7b-instruct:free");
        assert_eq!(settings.model_for(Provider::Groq), "llama3-70b-8192");
        assert!(!settings.use_memory);
        assert_eq!(settings.memory_limit, 4);
        assert_eq!(settings.memory.capacity, 20);
        assert_eq!(settings.memory.eviction, EvictionScope::PerSession);
        assert_eq!(settings.base_url_for(Provider::Ollama), "http://gpu-box:11434");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(load(&[("FLOATBALL_PROVIDER", "skynet")]), Err(Error::UnknownProvider(_))));
        assert!(matches!(load(&[("FLOATBALL_MEMORY_LIMIT", "ten")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("FLOATBALL_MEMORY_CAPACITY", "0")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("FLOATBALL_USE_MEMORY", "maybe")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("FLOATBALL_EVICTION", "lru")]), Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_panel_mutations() {
        let mut settings = Settings::default();
        settings.set_api_key(Provider::Glhf, " glhf-key ");
        assert_eq!(settings.api_key(Provider::Glhf), Some("glhf-key"));
        assert!(settings.has_api_key(Provider::Glhf));

        settings.set_api_key(Provider::Glhf, "");
        assert!(!settings.has_api_key(Provider::Glhf));
        assert!(settings.has_api_key(Provider::Ollama));

        settings.select_provider(Provider::Cohere);
        settings.select_model("command-light");
        assert_eq!(settings.model_for(Provider::Cohere), "command-light");
        settings.select_model("");
        assert_eq!(settings.model_for(Provider::Cohere), "command-r-plus");
    }
}

//! Structured logging module for Floatball
//!
//! Events go through `tracing` with a `category` field:
//! - MEMORY: interaction records saved or evicted
//! - PROMPT: system prompt assembly
//! - PROVIDER: outbound LLM requests and replies
//! - SESSION: session and settings lifecycle
//! - ERROR: failures
//!
//! `init_logging` mirrors every event to the console and to a daily file
//! `floatball-YYYY-MM-DD.log` in the log directory.

use chrono::{Local, Utc};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Memory,
    Prompt,
    Provider,
    Session,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Memory => "MEMORY",
            LogCategory::Prompt => "PROMPT",
            LogCategory::Provider => "PROVIDER",
            LogCategory::Session => "SESSION",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Default log directory: `<data dir>/floatball/logs`, falling back to the temp dir.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("floatball")
        .join("logs")
}

/// Today's log file inside `log_dir`
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    log_dir.join(format!("floatball-{}.log", today))
}

/// Initialize the logging system - creates the log directory if needed.
///
/// Calling this twice is harmless; the second subscriber is simply not installed.
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(log_dir))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .is_ok();

    if initialized {
        log_session(None, "Floatball logging initialized");
    }

    Ok(())
}

fn short_session(session_id: Option<Uuid>) -> String {
    session_id
        .map(|id| id.simple().to_string()[..8].to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<Uuid>, message: &str) {
    let session = short_session(session_id);
    match category {
        LogCategory::Error => {
            tracing::error!(category = category.as_str(), session = %session, "{}", message)
        }
        _ => tracing::info!(category = category.as_str(), session = %session, "{}", message),
    }
}

/// Low-volume detail that only shows up with `RUST_LOG=debug`
pub fn log_debug(category: LogCategory, session_id: Option<Uuid>, message: &str) {
    let session = short_session(session_id);
    tracing::debug!(category = category.as_str(), session = %session, "{}", message);
}

pub fn log_memory(session_id: Option<Uuid>, message: &str) {
    log(LogCategory::Memory, session_id, message);
}

pub fn log_prompt(session_id: Option<Uuid>, message: &str) {
    log(LogCategory::Prompt, session_id, message);
}

pub fn log_provider(session_id: Option<Uuid>, message: &str) {
    log(LogCategory::Provider, session_id, message);
}

pub fn log_session(session_id: Option<Uuid>, message: &str) {
    log(LogCategory::Session, session_id, message);
}

pub fn log_error(session_id: Option<Uuid>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Clean up log files older than `keep_days`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: i64) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(keep_days);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("floatball-") && n.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified_time: chrono::DateTime<Utc> = modified.into();
            if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

//! SQLite-backed `MemoryManager`.
//!
//! Same ordering, capacity and eviction rules as `InMemoryStore`, but the log
//! survives restarts when opened on a file.

use crate::error::Result;
use crate::logging;
use crate::memory::{
    sort_recent_first, topic_matches, EvictionScope, InteractionRecord, MemoryConfig,
    MemoryManager,
};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

pub struct SqliteStore {
    config: MemoryConfig,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path, config: MemoryConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, config)
    }

    pub fn open_in_memory(config: MemoryConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, config)
    }

    fn init(conn: Connection, config: MemoryConfig) -> Result<Self> {
        conn.execute_batch(
            "
            -- One row per user/assistant exchange
            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                topic TEXT NOT NULL DEFAULT '',
                user_input TEXT NOT NULL,
                assistant_response TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_session ON interactions(session_id, id);
            ",
        )?;

        // A file written with a larger capacity is cut down on open
        let trimmed = trim_all(&conn, &config)?;
        if trimmed > 0 {
            logging::log_memory(
                None,
                &format!("Trimmed {} interactions to capacity {}", trimmed, config.capacity),
            );
        }

        Ok(Self {
            config,
            conn: Mutex::new(conn),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    fn session_records(&self, session_id: Uuid) -> Result<Vec<InteractionRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, timestamp, topic, user_input, assistant_response
                 FROM interactions
                 WHERE session_id = ?1
                 ORDER BY id DESC",
            )?;

            let records = stmt.query_map(params![session_id.to_string()], record_from_row)?;
            records.collect()
        })
    }
}

/// Delete the oldest rows beyond capacity in the scope of `session`. Returns rows removed.
fn trim_scope(conn: &Connection, config: &MemoryConfig, session: &str) -> rusqlite::Result<usize> {
    let capacity = config.capacity as i64;
    match config.eviction {
        EvictionScope::Global => conn.execute(
            "DELETE FROM interactions WHERE id IN (
                 SELECT id FROM interactions ORDER BY id DESC LIMIT -1 OFFSET ?1
             )",
            params![capacity],
        ),
        EvictionScope::PerSession => conn.execute(
            "DELETE FROM interactions WHERE id IN (
                 SELECT id FROM interactions WHERE session_id = ?2
                 ORDER BY id DESC LIMIT -1 OFFSET ?1
             )",
            params![capacity, session],
        ),
    }
}

/// Bring every scope within capacity.
fn trim_all(conn: &Connection, config: &MemoryConfig) -> rusqlite::Result<usize> {
    let capacity = config.capacity as i64;
    match config.eviction {
        EvictionScope::Global => trim_scope(conn, config, ""),
        EvictionScope::PerSession => conn.execute(
            "DELETE FROM interactions WHERE id IN (
                 SELECT id FROM (
                     SELECT id, ROW_NUMBER() OVER (PARTITION BY session_id ORDER BY id DESC) AS pos
                     FROM interactions
                 ) WHERE pos > ?1
             )",
            params![capacity],
        ),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let session: String = row.get(1)?;
    let timestamp: String = row.get(2)?;

    let session_id = Uuid::parse_str(&session).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Local);

    Ok(InteractionRecord {
        id: row.get(0)?,
        session_id,
        timestamp,
        topic: row.get(3)?,
        user_input: row.get(4)?,
        assistant_response: row.get(5)?,
    })
}

impl MemoryManager for SqliteStore {
    fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn get_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<InteractionRecord>> {
        let mut records = self.session_records(session_id)?;
        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    fn get_by_topic(
        &self,
        session_id: Uuid,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        let mut records: Vec<InteractionRecord> = self
            .session_records(session_id)?
            .into_iter()
            .filter(|r| topic_matches(&r.topic, topic))
            .collect();
        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    fn save(
        &self,
        session_id: Uuid,
        topic: &str,
        user_input: &str,
        response: &str,
    ) -> Result<InteractionRecord> {
        let session = session_id.to_string();

        let (record, evicted) = self.with_connection(|conn| {
            let last: Option<String> = conn
                .query_row(
                    "SELECT timestamp FROM interactions ORDER BY id DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            let now = Local::now();
            let timestamp = last
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|t| t.with_timezone(&Local))
                .filter(|t| *t > now)
                .unwrap_or(now);

            conn.execute(
                "INSERT INTO interactions (session_id, timestamp, topic, user_input, assistant_response)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session, timestamp.to_rfc3339(), topic, user_input, response],
            )?;
            let id = conn.last_insert_rowid();

            let evicted = trim_scope(conn, &self.config, &session)?;

            Ok((
                InteractionRecord {
                    id,
                    session_id,
                    timestamp,
                    topic: topic.to_string(),
                    user_input: user_input.to_string(),
                    assistant_response: response.to_string(),
                },
                evicted,
            ))
        })?;

        logging::log_memory(
            Some(session_id),
            &format!("Stored interaction #{} in sqlite (topic: '{}')", record.id, record.topic),
        );
        if evicted > 0 {
            logging::log_debug(
                logging::LogCategory::Memory,
                Some(session_id),
                &format!("Capacity {} reached, evicted {} interactions", self.config.capacity, evicted),
            );
        }

        Ok(record)
    }

    fn has_previous(&self, session_id: Uuid) -> Result<bool> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM interactions WHERE session_id = ?1)",
                params![session_id.to_string()],
                |row| row.get(0),
            )
        })
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
        })?;
        Ok(count as usize)
    }
}

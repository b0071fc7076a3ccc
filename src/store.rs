//! Interaction store — the durable-storage collaborator.
//!
//! The agent core never touches persistence; the gateway hands each finished
//! reading to an [`InteractionStore`] keyed by a short share id so it can be
//! retrieved later. The already-perturbed text is what gets stored: re-running
//! the perturbation would not reproduce the wording bit-for-bit.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Visitor session row (one per hashed IP).
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: String,
    pub ip_hash: String,
    pub user_agent: Option<String>,
    pub language: String,
}

/// One finished reading, ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    pub question: String,
    pub question_hash: String,
    pub result: String,
    pub state: String,
    pub mother_verdict: String,
    /// Feature snapshot, serialized as JSON. Re-deriving features from this
    /// reproduces the mother verdict (selector determinism).
    pub features_json: String,
    pub language: String,
    pub is_night: bool,
    pub timestamp: DateTime<Local>,
    pub response_time_ms: i64,
    pub share_id: String,
}

/// Usage profile for one visitor.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: String,
    pub first_visit: String,
    pub last_visit: String,
    pub total_visits: i64,
    pub favorite_language: Option<String>,
    pub total_interactions: i64,
    pub avg_response_time_ms: f64,
    /// Share of readings taken between 23:00 and 03:00.
    pub night_ratio: f64,
    /// Readings per destiny state, keyed by the stored state label.
    pub state_counts: BTreeMap<String, i64>,
}

/// Whole-system usage counters.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_users: i64,
    pub total_interactions: i64,
    pub today_interactions: i64,
    pub language_counts: BTreeMap<String, i64>,
    pub state_counts: BTreeMap<String, i64>,
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn upsert_session(&self, session: &SessionRecord) -> Result<()>;
    async fn save_interaction(&self, record: &InteractionRecord) -> Result<()>;
    async fn interaction_by_share_id(&self, share_id: &str) -> Result<Option<InteractionRecord>>;
    async fn recent_interactions(&self, limit: usize) -> Result<Vec<InteractionRecord>>;
    /// One visitor's latest readings, newest first.
    async fn recent_interactions_for(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>>;
    /// `None` when the visitor has no session row yet.
    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>>;
    async fn global_stats(&self) -> Result<GlobalStats>;
    async fn clear_interactions(&self) -> Result<u64>;
}

/// SQLite-backed store. Single pooled connection behind a mutex; the write
/// volume here is one row per reading, nowhere near contention territory.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }

        let conn = Connection::open(db_path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      TEXT NOT NULL UNIQUE,
                ip_hash      TEXT NOT NULL,
                first_visit  TEXT NOT NULL,
                last_visit   TEXT NOT NULL,
                visit_count  INTEGER DEFAULT 1,
                user_agent   TEXT,
                language     TEXT
            );

            CREATE TABLE IF NOT EXISTS user_interactions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                question         TEXT NOT NULL,
                question_hash    TEXT NOT NULL,
                result           TEXT NOT NULL,
                state            TEXT NOT NULL,
                mother_verdict   TEXT NOT NULL,
                features_json    TEXT NOT NULL,
                language         TEXT NOT NULL,
                is_night         INTEGER DEFAULT 0,
                timestamp        TEXT NOT NULL,
                response_time_ms INTEGER,
                share_id         TEXT UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_user ON user_interactions(user_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_share ON user_interactions(share_id);",
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex here means a panic mid-statement; propagating the
        // poison as a panic is the only sane option left.
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<InteractionRecord> {
        let timestamp: String = row.get("timestamp")?;
        Ok(InteractionRecord {
            user_id: row.get("user_id")?,
            question: row.get("question")?,
            question_hash: row.get("question_hash")?,
            result: row.get("result")?,
            state: row.get("state")?,
            mother_verdict: row.get("mother_verdict")?,
            features_json: row.get("features_json")?,
            language: row.get("language")?,
            is_night: row.get::<_, i64>("is_night")? != 0,
            timestamp: timestamp
                .parse::<DateTime<Local>>()
                .unwrap_or_else(|_| Local::now()),
            response_time_ms: row.get::<_, Option<i64>>("response_time_ms")?.unwrap_or(0),
            share_id: row.get::<_, Option<String>>("share_id")?.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl InteractionStore for SqliteStore {
    async fn upsert_session(&self, session: &SessionRecord) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO user_sessions (user_id, ip_hash, first_visit, last_visit, visit_count, user_agent, language)
             VALUES (?1, ?2, ?3, ?3, 1, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 last_visit = ?3,
                 visit_count = visit_count + 1,
                 user_agent = COALESCE(?4, user_agent),
                 language = ?5",
            params![
                session.user_id,
                session.ip_hash,
                now,
                session.user_agent,
                session.language
            ],
        )?;
        Ok(())
    }

    async fn save_interaction(&self, record: &InteractionRecord) -> Result<()> {
        self.lock().execute(
            "INSERT INTO user_interactions
                 (user_id, question, question_hash, result, state, mother_verdict,
                  features_json, language, is_night, timestamp, response_time_ms, share_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.user_id,
                record.question,
                record.question_hash,
                record.result,
                record.state,
                record.mother_verdict,
                record.features_json,
                record.language,
                i64::from(record.is_night),
                record.timestamp.to_rfc3339(),
                record.response_time_ms,
                record.share_id,
            ],
        )?;
        Ok(())
    }

    async fn interaction_by_share_id(&self, share_id: &str) -> Result<Option<InteractionRecord>> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT * FROM user_interactions WHERE share_id = ?1",
                params![share_id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    async fn recent_interactions(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM user_interactions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_record)?;
        let mut records: Vec<InteractionRecord> =
            rows.collect::<rusqlite::Result<_>>().map_err(StoreError::from)?;
        records.reverse();
        Ok(records)
    }

    async fn recent_interactions_for(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM user_interactions WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], Self::row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<_>>().map_err(StoreError::from)?)
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let conn = self.lock();

        let session = conn
            .query_row(
                "SELECT first_visit, last_visit, visit_count, language
                 FROM user_sessions WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((first_visit, last_visit, total_visits, favorite_language)) = session else {
            return Ok(None);
        };

        let (total_interactions, avg_response_time_ms, night_count): (i64, Option<f64>, Option<i64>) =
            conn.query_row(
                "SELECT COUNT(*), AVG(response_time_ms), SUM(is_night)
                 FROM user_interactions WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let mut stmt = conn.prepare(
            "SELECT state, COUNT(*) FROM user_interactions WHERE user_id = ?1 GROUP BY state",
        )?;
        let state_counts = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        let night_ratio = if total_interactions > 0 {
            night_count.unwrap_or(0) as f64 / total_interactions as f64
        } else {
            0.0
        };

        Ok(Some(UserStats {
            user_id: user_id.to_string(),
            first_visit,
            last_visit,
            total_visits,
            favorite_language,
            total_interactions,
            avg_response_time_ms: avg_response_time_ms.unwrap_or(0.0),
            night_ratio,
            state_counts,
        }))
    }

    async fn global_stats(&self) -> Result<GlobalStats> {
        let conn = self.lock();

        let total_users: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_sessions", [], |row| row.get(0))?;
        let total_interactions: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_interactions", [], |row| row.get(0))?;
        // Timestamps carry an offset suffix, which SQLite's date functions
        // normalize to UTC before comparing.
        let today_interactions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_interactions WHERE DATE(timestamp) = DATE('now')",
            [],
            |row| row.get(0),
        )?;

        let group_count = |sql: &str| -> Result<BTreeMap<String, i64>> {
            let mut stmt = conn.prepare(sql)?;
            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
            Ok(counts)
        };
        let language_counts =
            group_count("SELECT language, COUNT(*) FROM user_interactions GROUP BY language")?;
        let state_counts =
            group_count("SELECT state, COUNT(*) FROM user_interactions GROUP BY state")?;

        Ok(GlobalStats {
            total_users,
            total_interactions,
            today_interactions,
            language_counts,
            state_counts,
        })
    }

    async fn clear_interactions(&self) -> Result<u64> {
        let deleted = self.lock().execute("DELETE FROM user_interactions", [])?;
        Ok(deleted as u64)
    }
}

//! Durable storage: SQLite via `sqlx`, schema created at pool construction (no external
//! migration runner), matching the teacher's `AuthManager::init_db` bootstrap style.

use async_trait::async_trait;
use braid_core::contracts::{NewRevision, PageFields, PageStore, RevisionStore};
use braid_core::error::{CollabError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(database_path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path.display()))?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                page_id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                body_format TEXT NOT NULL DEFAULT 'markdown',
                updated_at INTEGER NOT NULL DEFAULT 0,
                updated_by TEXT NOT NULL DEFAULT '',
                last_committed_at INTEGER,
                last_committed_content TEXT,
                has_uncommitted_changes INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS revisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id TEXT NOT NULL,
                author TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                snapshot TEXT NOT NULL,
                format TEXT NOT NULL,
                opaque_update_bytes BLOB
            );

            CREATE TABLE IF NOT EXISTS collab_sessions (
                id TEXT PRIMARY KEY,
                page_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                closed_at INTEGER,
                checkpoint_version INTEGER NOT NULL DEFAULT 0,
                checkpoint_bytes BLOB NOT NULL DEFAULT '',
                awareness_json TEXT
            );

            CREATE TABLE IF NOT EXISTS collab_updates (
                id INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                vector_clock_json TEXT,
                update_bytes BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (session_id, id)
            );

            CREATE TABLE IF NOT EXISTS collab_checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                snapshot_bytes BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(session_id, version)
            );

            CREATE INDEX IF NOT EXISTS idx_collab_updates_session ON collab_updates(session_id, id);
            CREATE INDEX IF NOT EXISTS idx_collab_sessions_page ON collab_sessions(page_id, closed_at);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn append_update(&self, session_id: &str, id: u64, client_id: &str, vector_clock_json: Option<&str>, bytes: &[u8], created_at_ms: i64) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO collab_updates (id, session_id, client_id, vector_clock_json, update_bytes, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(id as i64)
            .bind(session_id)
            .bind(client_id)
            .bind(vector_clock_json)
            .bind(bytes)
            .bind(created_at_ms)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn store_checkpoint(&self, session_id: &str, version: u64, snapshot_bytes: &[u8], created_at_ms: i64) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO collab_checkpoints (session_id, version, snapshot_bytes, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id, version) DO UPDATE SET snapshot_bytes = excluded.snapshot_bytes",
        )
        .bind(session_id)
        .bind(version as i64)
        .bind(snapshot_bytes)
        .bind(created_at_ms)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE collab_sessions SET checkpoint_version = ?, checkpoint_bytes = ? WHERE id = ?")
            .bind(version as i64)
            .bind(snapshot_bytes)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn ensure_collab_session(&self, session_id: &str, page_id: &str, created_at_ms: i64) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collab_sessions (id, page_id, created_at, checkpoint_version, checkpoint_bytes) VALUES (?, ?, ?, 0, '')")
            .bind(session_id)
            .bind(page_id)
            .bind(created_at_ms)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn latest_checkpoint_bytes(&self, session_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT checkpoint_bytes FROM collab_sessions WHERE id = ?").bind(session_id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("checkpoint_bytes")))
    }
}

#[async_trait]
impl PageStore for Db {
    async fn load_committed_content(&self, page_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT last_committed_content FROM pages WHERE page_id = ?")
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CollabError::Storage(e.into()))?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>("last_committed_content")))
    }

    async fn apply_commit(&self, page_id: &str, user_id: &str, fields: &PageFields) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO pages (page_id, title, summary, body, body_format, updated_at, updated_by, last_committed_at, last_committed_content, has_uncommitted_changes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
             ON CONFLICT(page_id) DO UPDATE SET
               title = excluded.title, summary = excluded.summary, body = excluded.body, body_format = excluded.body_format,
               updated_at = excluded.updated_at, updated_by = excluded.updated_by,
               last_committed_at = excluded.last_committed_at, last_committed_content = excluded.last_committed_content,
               has_uncommitted_changes = 0",
        )
        .bind(page_id)
        .bind(&fields.title)
        .bind(&fields.summary)
        .bind(&fields.body)
        .bind(&fields.body_format)
        .bind(now)
        .bind(user_id)
        .bind(now)
        .bind(&fields.body)
        .execute(&self.pool)
        .await
        .map_err(|e| CollabError::Storage(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl RevisionStore for Db {
    async fn insert(&self, revision: NewRevision) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO revisions (page_id, author, created_at, note, snapshot, format, opaque_update_bytes) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&revision.page_id)
        .bind(&revision.author)
        .bind(now)
        .bind(&revision.note)
        .bind(&revision.snapshot)
        .bind(&revision.format)
        .bind(&revision.opaque_update_bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| CollabError::Storage(e.into()))?;
        Ok(result.last_insert_rowid())
    }
}

//! SQLite persistence for augmented content.
//!
//! Schema changes go through numbered migrations tracked in a `_migrations`
//! table, applied in order on startup.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::content::AugmentedContent;
use crate::error::{AugmentError, Result};

const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS augmented_content (
    id TEXT PRIMARY KEY,
    node_id TEXT NOT NULL,
    content_version INTEGER NOT NULL,
    sections TEXT NOT NULL,
    generated_at TEXT NOT NULL,
    model_used TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    UNIQUE (node_id, content_version)
);

CREATE INDEX IF NOT EXISTS idx_augmented_content_node
    ON augmented_content(node_id);
"#;

const CURRENT_VERSION: i32 = 1;

async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(row.0.unwrap_or(0))
}

async fn record_migration(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = get_current_version(pool).await?;
    if current >= CURRENT_VERSION {
        debug!("schema up to date at v{}", current);
        return Ok(());
    }

    if current < 1 {
        info!("applying migration v1: augmented_content table");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    Ok(())
}

/// Raw row as stored; decoded into [`AugmentedContent`] on read.
#[derive(Debug, FromRow)]
struct ContentRow {
    id: String,
    node_id: String,
    content_version: i64,
    sections: String,
    generated_at: String,
    model_used: String,
    confidence_score: f64,
}

impl ContentRow {
    fn into_content(self) -> Result<AugmentedContent> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| AugmentError::Corrupt(format!("row id '{}': {}", self.id, e)))?;
        let sections = serde_json::from_str(&self.sections)
            .map_err(|e| AugmentError::Corrupt(format!("sections for '{}': {}", self.node_id, e)))?;
        let generated_at = DateTime::parse_from_rfc3339(&self.generated_at)
            .map_err(|e| {
                AugmentError::Corrupt(format!("timestamp for '{}': {}", self.node_id, e))
            })?
            .with_timezone(&Utc);

        Ok(AugmentedContent {
            id,
            node_id: self.node_id,
            content_version: self.content_version,
            sections,
            generated_at,
            model_used: self.model_used,
            confidence_score: self.confidence_score as f32,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, node_id, content_version, sections, generated_at, model_used, confidence_score";

/// Pool-backed store for augmented content rows.
#[derive(Debug, Clone)]
pub struct ContentStore {
    pool: SqlitePool,
}

impl ContentStore {
    /// Open (creating if missing) a file-backed store and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_str = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&connection_str)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        info!("content store ready at {}", path.display());
        Ok(Self { pool })
    }

    /// In-memory store for tests. A single connection keeps the data alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Latest version for a node, if any.
    pub async fn latest(&self, node_id: &str) -> Result<Option<AugmentedContent>> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM augmented_content \
             WHERE node_id = ? ORDER BY content_version DESC LIMIT 1"
        ))
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentRow::into_content).transpose()
    }

    /// One specific version for a node.
    pub async fn get(&self, node_id: &str, version: i64) -> Result<Option<AugmentedContent>> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM augmented_content \
             WHERE node_id = ? AND content_version = ?"
        ))
        .bind(node_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentRow::into_content).transpose()
    }

    /// Every stored version for a node, oldest first.
    pub async fn history(&self, node_id: &str) -> Result<Vec<AugmentedContent>> {
        let rows: Vec<ContentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM augmented_content \
             WHERE node_id = ? ORDER BY content_version ASC"
        ))
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContentRow::into_content).collect()
    }

    /// Next unused version number for a node. Callers are serialized per
    /// node by the flight map, so the number stays free until they insert.
    pub async fn next_version(&self, node_id: &str) -> Result<i64> {
        let row: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(content_version) FROM augmented_content WHERE node_id = ?")
                .bind(node_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0.unwrap_or(0) + 1)
    }

    pub async fn insert(&self, content: &AugmentedContent) -> Result<()> {
        let sections = serde_json::to_string(&content.sections)
            .map_err(|e| AugmentError::Corrupt(format!("serialize sections: {}", e)))?;

        sqlx::query(
            "INSERT INTO augmented_content \
             (id, node_id, content_version, sections, generated_at, model_used, confidence_score) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(content.id.to_string())
        .bind(&content.node_id)
        .bind(content.content_version)
        .bind(&sections)
        .bind(content.generated_at.to_rfc3339())
        .bind(&content.model_used)
        .bind(content.confidence_score as f64)
        .execute(&self.pool)
        .await?;

        debug!(
            node_id = %content.node_id,
            version = content.content_version,
            "content persisted"
        );
        Ok(())
    }
}

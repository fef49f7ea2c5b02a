use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Row, SqliteConnection};
use thiserror::Error;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS flagged_questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date VARCHAR(10) NOT NULL,
    time VARCHAR(8) NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL
)";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open flag store at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("flag store query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// One row of the flag table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedRecord {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub question: String,
    pub answer: String,
}

/// Write side of the flag store as seen by the conversation core.
#[async_trait]
pub trait FlagSink: Send + Sync {
    async fn record(&self, question: &str, answer: &str) -> Result<(), StoreError>;
}

/// SQLite-backed flag store.
///
/// Every call opens its own connection, creates the table if absent, and
/// closes the connection before returning. No pool is shared between calls.
#[derive(Debug, Clone)]
pub struct SqliteFlagStore {
    db_path: PathBuf,
}

impl SqliteFlagStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> Result<SqliteConnection, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|source| StoreError::Connect {
                path: self.db_path.display().to_string(),
                source,
            })?;

        sqlx::query(CREATE_TABLE).execute(&mut conn).await?;
        Ok(conn)
    }

    /// Inserts a record stamped with `at`, split into `YYYY-MM-DD` and
    /// `HH:MM:SS`.
    pub async fn record_at(
        &self,
        question: &str,
        answer: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;

        sqlx::query("INSERT INTO flagged_questions (date, time, question, answer) VALUES (?, ?, ?, ?)")
            .bind(at.format("%Y-%m-%d").to_string())
            .bind(at.format("%H:%M:%S").to_string())
            .bind(question)
            .bind(answer)
            .execute(&mut conn)
            .await?;

        conn.close().await?;
        Ok(())
    }

    /// Newest records first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<FlaggedRecord>, StoreError> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query(
            "SELECT id, date, time, question, answer FROM flagged_questions ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut conn)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(FlaggedRecord {
                id: row.try_get("id")?,
                date: row.try_get("date")?,
                time: row.try_get("time")?,
                question: row.try_get("question")?,
                answer: row.try_get("answer")?,
            });
        }

        conn.close().await?;
        Ok(records)
    }
}

#[async_trait]
impl FlagSink for SqliteFlagStore {
    async fn record(&self, question: &str, answer: &str) -> Result<(), StoreError> {
        self.record_at(question, answer, Local::now().naive_local())
            .await?;
        tracing::info!("Flagged question recorded in {}", self.db_path.display());
        Ok(())
    }
}

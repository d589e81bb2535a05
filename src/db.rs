//! SQLite-backed store for research findings.
//!
//! Findings live in a single `findings` table; a parallel FTS5 table
//! indexes claim and evidence text and is kept in sync by triggers, so a
//! row is searchable the moment it is committed. Opening the store creates
//! or upgrades the schema in the same step.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::models::{clamp_confidence, Finding, FindingUpdate, NewFinding, SearchHit};

const SCHEMA_VERSION: i64 = 2;

const FINDING_COLUMNS: &str =
    "id, url, source_type, claim, evidence, confidence, tags, workstream, retrieved_at";

/// Handle to an open findings database.
pub struct FindingsDb {
    pool: SqlitePool,
}

impl FindingsDb {
    /// Open (creating if needed) the database at `path` and bring its
    /// schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating database directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS findings (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                source_type TEXT NOT NULL,
                claim TEXT NOT NULL,
                evidence TEXT NOT NULL,
                confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
                tags TEXT NOT NULL DEFAULT '[]',
                workstream TEXT,
                retrieved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for sql in [
            "CREATE INDEX IF NOT EXISTS idx_findings_workstream ON findings(workstream)",
            "CREATE INDEX IF NOT EXISTS idx_findings_source_type ON findings(source_type)",
            "CREATE INDEX IF NOT EXISTS idx_findings_confidence ON findings(confidence)",
            "CREATE INDEX IF NOT EXISTS idx_findings_retrieved_at ON findings(retrieved_at)",
        ] {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        // FTS5 virtual tables have no IF NOT EXISTS, so check first.
        let fts_exists = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'findings_fts'",
        )
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        if !fts_exists {
            sqlx::query(
                "CREATE VIRTUAL TABLE findings_fts USING fts5(id UNINDEXED, claim, evidence)",
            )
            .execute(&self.pool)
            .await?;
        }

        for (name, create) in [
            (
                "findings_ai",
                r#"
                CREATE TRIGGER findings_ai AFTER INSERT ON findings BEGIN
                    INSERT INTO findings_fts (id, claim, evidence)
                    VALUES (new.id, new.claim, new.evidence);
                END
                "#,
            ),
            (
                "findings_ad",
                r#"
                CREATE TRIGGER findings_ad AFTER DELETE ON findings BEGIN
                    DELETE FROM findings_fts WHERE id = old.id;
                END
                "#,
            ),
            (
                "findings_au",
                r#"
                CREATE TRIGGER findings_au AFTER UPDATE ON findings BEGIN
                    DELETE FROM findings_fts WHERE id = old.id;
                    INSERT INTO findings_fts (id, claim, evidence)
                    VALUES (new.id, new.claim, new.evidence);
                END
                "#,
            ),
        ] {
            sqlx::query(&format!("DROP TRIGGER IF EXISTS {name}"))
                .execute(&self.pool)
                .await?;
            sqlx::query(create).execute(&self.pool).await?;
        }

        let row = sqlx::query("SELECT MAX(version) AS version FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        let version: Option<i64> = row.get("version");
        match version {
            Some(v) if v >= SCHEMA_VERSION => {}
            Some(_) => {
                // Releases before v2 did not constrain confidence.
                sqlx::query(
                    "UPDATE findings SET confidence = MIN(MAX(confidence, 0.0), 1.0) \
                     WHERE confidence < 0.0 OR confidence > 1.0",
                )
                .execute(&self.pool)
                .await?;
                self.stamp_version().await?;
            }
            None => self.stamp_version().await?,
        }

        debug!(version = SCHEMA_VERSION, "findings schema ready");
        Ok(())
    }

    async fn stamp_version(&self) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(SCHEMA_VERSION)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a finding, assigning a fresh id and the current timestamp.
    /// Returns the new id.
    pub async fn insert(&self, finding: &NewFinding) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let retrieved_at = chrono::Utc::now().to_rfc3339();
        let confidence = clamp_confidence(finding.confidence);
        let tags_json = serde_json::to_string(&finding.tags)?;

        sqlx::query(&format!(
            "INSERT INTO findings ({FINDING_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&id)
        .bind(&finding.url)
        .bind(&finding.source_type)
        .bind(&finding.claim)
        .bind(&finding.evidence)
        .bind(confidence)
        .bind(&tags_json)
        .bind(finding.workstream.as_deref())
        .bind(&retrieved_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Apply the populated fields of `update` to the finding with `id`.
    /// Returns false when no such finding exists; an update with no
    /// populated fields only reports existence.
    pub async fn update(&self, id: &str, update: &FindingUpdate) -> Result<bool> {
        let exists = sqlx::query("SELECT id FROM findings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let mut sets: Vec<&str> = Vec::new();
        if update.url.is_some() {
            sets.push("url = ?");
        }
        if update.source_type.is_some() {
            sets.push("source_type = ?");
        }
        if update.claim.is_some() {
            sets.push("claim = ?");
        }
        if update.evidence.is_some() {
            sets.push("evidence = ?");
        }
        if update.confidence.is_some() {
            sets.push("confidence = ?");
        }
        if update.tags.is_some() {
            sets.push("tags = ?");
        }
        if update.workstream.is_some() {
            sets.push("workstream = ?");
        }
        if sets.is_empty() {
            return Ok(true);
        }

        let sql = format!("UPDATE findings SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        if let Some(url) = &update.url {
            query = query.bind(url);
        }
        if let Some(source_type) = &update.source_type {
            query = query.bind(source_type);
        }
        if let Some(claim) = &update.claim {
            query = query.bind(claim);
        }
        if let Some(evidence) = &update.evidence {
            query = query.bind(evidence);
        }
        if let Some(confidence) = update.confidence {
            query = query.bind(clamp_confidence(confidence));
        }
        if let Some(tags) = &update.tags {
            query = query.bind(serde_json::to_string(tags)?);
        }
        if let Some(workstream) = &update.workstream {
            query = query.bind(workstream);
        }
        query.bind(id).execute(&self.pool).await?;

        Ok(true)
    }

    /// Delete a finding. Returns false when no row matched.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM findings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Finding>> {
        let row = sqlx::query(&format!(
            "SELECT {FINDING_COLUMNS} FROM findings WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| finding_from_row(&r)))
    }

    /// Full-text search over claim and evidence, best matches first.
    pub async fn search(
        &self,
        query: &str,
        workstream: Option<&str>,
        source_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let mut sql = format!(
            "SELECT f.id, f.url, f.source_type, f.claim, f.evidence, f.confidence, \
             f.tags, f.workstream, f.retrieved_at, bm25(findings_fts) AS rank \
             FROM findings_fts \
             JOIN findings f ON f.id = findings_fts.id \
             WHERE findings_fts MATCH ?"
        );
        if workstream.is_some() {
            sql.push_str(" AND f.workstream = ?");
        }
        if source_type.is_some() {
            sql.push_str(" AND f.source_type = ?");
        }
        sql.push_str(" ORDER BY rank LIMIT ?");

        let mut q = sqlx::query(&sql).bind(query);
        if let Some(workstream) = workstream {
            q = q.bind(workstream);
        }
        if let Some(source_type) = source_type {
            q = q.bind(source_type);
        }
        let rows = q.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| SearchHit {
                finding: finding_from_row(row),
                rank: row.get("rank"),
            })
            .collect())
    }

    /// List findings newest first, with optional filters.
    pub async fn list(
        &self,
        workstream: Option<&str>,
        source_type: Option<&str>,
        min_confidence: Option<f64>,
        limit: i64,
    ) -> Result<Vec<Finding>> {
        let mut sql = format!("SELECT {FINDING_COLUMNS} FROM findings WHERE 1=1");
        if workstream.is_some() {
            sql.push_str(" AND workstream = ?");
        }
        if source_type.is_some() {
            sql.push_str(" AND source_type = ?");
        }
        if min_confidence.is_some() {
            sql.push_str(" AND confidence >= ?");
        }
        sql.push_str(" ORDER BY retrieved_at DESC LIMIT ?");

        let mut q = sqlx::query(&sql);
        if let Some(workstream) = workstream {
            q = q.bind(workstream);
        }
        if let Some(source_type) = source_type {
            q = q.bind(source_type);
        }
        if let Some(min_confidence) = min_confidence {
            q = q.bind(min_confidence);
        }
        let rows = q.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(finding_from_row).collect())
    }
}

fn finding_from_row(row: &SqliteRow) -> Finding {
    let tags_json: String = row.get("tags");
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Finding {
        id: row.get("id"),
        url: row.get("url"),
        source_type: row.get("source_type"),
        claim: row.get("claim"),
        evidence: row.get("evidence"),
        confidence: row.get("confidence"),
        tags,
        workstream: row.get("workstream"),
        retrieved_at: row.get("retrieved_at"),
    }
}

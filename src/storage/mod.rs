//! SQLite persistence for reasoning records.
//!
//! One append-only table holds the reasoning log. Idempotence is anchored
//! here: a composite uniqueness constraint over the dedup key makes the
//! database the final arbiter, regardless of what the pre-insert existence
//! check concluded under concurrency.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection};
use thiserror::Error;
use tracing::info;

use crate::models::{DedupKey, Platform, ReasoningRecord};

const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The dedup key already existed. Expected under races between
    /// concurrent deliveries of the same request state, never an error.
    Duplicate,
}

/// Filter for record queries. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub platform: Option<Platform>,
    pub repo_names: Vec<String>,
    pub authors: Vec<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<i64>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<i64>,
}

/// Handle to the reasoning log.
///
/// rusqlite connections are not Sync, so the connection sits behind a
/// Mutex; the write load is one insert per pipeline run, far below any
/// contention concern.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the
    /// schema. WAL keeps reads unblocked while the pipeline writes.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.execute_batch(MIGRATION)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store with the same schema.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MIGRATION)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Whether a record with this dedup key already exists.
    pub fn exists(&self, key: &DedupKey<'_>) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM business_reasoning_log \
             WHERE platform = ?1 AND repo_name = ?2 AND source_branch = ?3 \
               AND target_branch = ?4 AND last_commit_id = ?5",
            params![
                key.platform.as_str(),
                key.repo_name,
                key.source_branch,
                key.target_branch,
                key.last_commit_id
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a record, treating a dedup-key collision as a duplicate
    /// rather than a failure.
    pub fn insert(&self, record: &ReasoningRecord) -> Result<InsertOutcome, StorageError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO business_reasoning_log (\
                platform, repo_name, request_number, request_url, request_title, \
                source_branch, target_branch, last_commit_id, author, \
                commit_messages, created_at, business_summary, \
                reasoning_categories, reasoning_details, raw_reasoning_json\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.platform.as_str(),
                record.repo_name,
                record.request_number,
                record.request_url,
                record.request_title,
                record.source_branch,
                record.target_branch,
                record.last_commit_id,
                record.author,
                record.commit_messages,
                record.created_at,
                record.business_summary,
                record.reasoning_categories,
                record.reasoning_details,
                record.raw_reasoning_json,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_constraint_violation(&err) => {
                info!(key = %record.dedup_key(), "record already present, skipping insert");
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Query records matching a filter, newest first.
    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<ReasoningRecord>, StorageError> {
        let mut sql = String::from(
            "SELECT platform, repo_name, request_number, request_url, request_title, \
                    source_branch, target_branch, last_commit_id, author, \
                    commit_messages, created_at, business_summary, \
                    reasoning_categories, reasoning_details, raw_reasoning_json \
             FROM business_reasoning_log WHERE 1=1",
        );
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(platform) = filter.platform {
            sql.push_str(&format!(" AND platform = ?{}", args.len() + 1));
            args.push(Box::new(platform.as_str().to_string()));
        }
        push_in_clause(&mut sql, &mut args, "repo_name", &filter.repo_names);
        push_in_clause(&mut sql, &mut args, "author", &filter.authors);
        if let Some(from) = filter.created_from {
            sql.push_str(&format!(" AND created_at >= ?{}", args.len() + 1));
            args.push(Box::new(from));
        }
        if let Some(to) = filter.created_to {
            sql.push_str(&format!(" AND created_at <= ?{}", args.len() + 1));
            args.push(Box::new(to));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter().map(|a| a.as_ref())), row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn push_in_clause(
    sql: &mut String,
    args: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    values: &[String],
) {
    if values.is_empty() {
        return;
    }
    let placeholders: Vec<String> = (0..values.len())
        .map(|i| format!("?{}", args.len() + i + 1))
        .collect();
    sql.push_str(&format!(" AND {column} IN ({})", placeholders.join(", ")));
    for value in values {
        args.push(Box::new(value.clone()));
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReasoningRecord> {
    let platform: String = row.get(0)?;
    Ok(ReasoningRecord {
        platform: Platform::from_str(&platform).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?,
        repo_name: row.get(1)?,
        request_number: row.get(2)?,
        request_url: row.get(3)?,
        request_title: row.get(4)?,
        source_branch: row.get(5)?,
        target_branch: row.get(6)?,
        last_commit_id: row.get(7)?,
        author: row.get(8)?,
        commit_messages: row.get(9)?,
        created_at: row.get(10)?,
        business_summary: row.get(11)?,
        reasoning_categories: row.get(12)?,
        reasoning_details: row.get(13)?,
        raw_reasoning_json: row.get(14)?,
    })
}

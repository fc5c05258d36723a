//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - Users mirrored from the identity provider
//! - Templates with their questions, tags and access lists
//! - Forms, responses and answers
//! - Comments, likes and topics
//! - Admin-wide counts and paged listings

mod admin;
mod comments;
mod forms;
mod likes;
pub mod retry;
mod responses;
mod search;
mod templates;
mod topics;
mod users;

pub use admin::{AdminRepository, AdminStats};
pub use comments::{Comment, CommentRepository};
pub use forms::{Form, FormRepository};
pub use likes::LikeRepository;
pub use responses::{
    AnswerRecord, NewResponse, ResponseDetail, ResponseRepository, ResponseSummary,
    SubmitOutcome,
};
pub use search::{SearchRepository, TagCount};
pub use templates::{
    AccessInfo, Question, QuestionDraft, QuestionType, Template, TemplateDraft,
    TemplateRepository, TemplateSummary,
};
pub use topics::{Topic, TopicRepository};
pub use users::{User, UserProfile, UserRepository, generate_username};

use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// True when SQLite reported the database as busy or locked.
    pub fn is_busy(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db_err)) => {
                matches!(
                    db_err.code().as_deref(),
                    Some("5") | Some("6") | Some("517") | Some("262")
                )
            }
            DbError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

/// Returns true if the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// A requested page of a listing, already clamped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// One page of results plus the total matching count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }
}

/// Build a `%term%` LIKE pattern, escaping LIKE metacharacters with `\`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default pool size for file-backed databases.
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        Self::with_pool_size(path, Self::DEFAULT_MAX_CONNECTIONS).await
    }

    /// Create a database connection with an explicit pool size for file databases.
    pub async fn with_pool_size(path: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Use a uniquely named shared-cache memory database per call.
            // `file::memory:` is global-ish and will collide across parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:customforms-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .foreign_keys(true)
                .create_if_missing(true);

            // The shared-cache database lives only while a connection is open,
            // so the single connection is never reaped.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .max_lifetime(None)
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "Failed to create database directory"
                );
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(2))
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets readers proceed while a writer holds the lock
        if path != ":memory:" {
            sqlx::query("PRAGMA journal_mode=WAL")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA synchronous=NORMAL")
                .execute(&pool)
                .await?;
        }

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Internal(format!(
                "database integrity check failed: {}",
                integrity_result
            )));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get user repository.
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    /// Get template repository.
    pub fn templates(&self) -> TemplateRepository<'_> {
        TemplateRepository::new(&self.pool)
    }

    /// Get form repository.
    pub fn forms(&self) -> FormRepository<'_> {
        FormRepository::new(&self.pool)
    }

    /// Get response repository.
    pub fn responses(&self) -> ResponseRepository<'_> {
        ResponseRepository::new(&self.pool)
    }

    /// Get comment repository.
    pub fn comments(&self) -> CommentRepository<'_> {
        CommentRepository::new(&self.pool)
    }

    /// Get like repository.
    pub fn likes(&self) -> LikeRepository<'_> {
        LikeRepository::new(&self.pool)
    }

    /// Get topic repository.
    pub fn topics(&self) -> TopicRepository<'_> {
        TopicRepository::new(&self.pool)
    }

    /// Get search repository.
    pub fn search(&self) -> SearchRepository<'_> {
        SearchRepository::new(&self.pool)
    }

    /// Get admin repository.
    pub fn admin(&self) -> AdminRepository<'_> {
        AdminRepository::new(&self.pool)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_databases_are_isolated() {
        let a = Database::new(":memory:").await.unwrap();
        let b = Database::new(":memory:").await.unwrap();

        a.topics().create("Only In A").await.unwrap();

        assert_eq!(a.topics().list().await.unwrap().len(), 1);
        assert!(b.topics().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_database_connection_is_never_reaped() {
        let db = Database::new(":memory:").await.unwrap();
        db.topics().create("Kept").await.unwrap();

        let options = db.pool().options();
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);
        assert_eq!(db.pool().size(), 1);
        assert_eq!(db.topics().list().await.unwrap().len(), 1);
    }

    #[test]
    fn page_request_offsets() {
        let first = PageRequest::new(0, 10);
        assert_eq!(first.page, 1);
        assert_eq!(first.offset(), 0);

        let third = PageRequest::new(3, 25);
        assert_eq!(third.offset(), 50);
        assert_eq!(third.limit(), 25);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" survey "), "%survey%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}

//! SQLite implementation of `Directory` and `PullRequestStore`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Concurrency
//!
//! A single connection behind a mutex serializes all writes, so conflicting
//! mutations of the same pull request (merge vs. swap, swap vs. swap) cannot
//! interleave. Multi-row writes (pull request + initial reviewers, reviewer
//! swap remove + insert) run inside transactions so they are all-or-nothing.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::warn;

use super::{Directory, PullRequestStore, StoreError};
use crate::models::{
    PrStats, PrStatus, PullRequest, PullRequestSummary, Team, TeamMember, User, UserReviewStats,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Upper bound on host parameters bound into a single statement. SQLite
/// builds limited to the historical default reject statements with more
/// than 999 parameters.
const MAX_QUERY_PARAMS: usize = 500;

/// SQLite-backed store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and runs any
    /// pending migrations if the database exists with an older schema.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for maximum durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();

        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        // Verify WAL mode was actually enabled - SQLite can silently keep
        // DELETE mode on some filesystems (e.g., network filesystems that
        // don't support shared memory). In-memory databases report "memory",
        // which is fine since they are ephemeral by design.
        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(StoreError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| StoreError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS teams (
                    team_name TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                    user_id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    team_name TEXT NOT NULL,
                    is_active INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_users_team_active
                    ON users(team_name, is_active);

                CREATE TABLE IF NOT EXISTS pull_requests (
                    pull_request_id TEXT PRIMARY KEY,
                    pull_request_name TEXT NOT NULL,
                    author_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    need_more_reviewers INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    merged_at INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_pull_requests_status
                    ON pull_requests(status);

                CREATE TABLE IF NOT EXISTS pull_request_reviewers (
                    pull_request_id TEXT NOT NULL,
                    reviewer_id TEXT NOT NULL,
                    PRIMARY KEY (pull_request_id, reviewer_id)
                );

                CREATE INDEX IF NOT EXISTS idx_reviewers_by_user
                    ON pull_request_reviewers(reviewer_id);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }
}

/// Current unix timestamp in seconds, as persisted in the timestamp columns.
fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Convert a persisted unix timestamp back to a `DateTime<Utc>`.
///
/// Out-of-range values indicate database corruption; they are logged and
/// reported as an absent timestamp rather than failing the whole read.
fn secs_to_datetime(secs: i64, operation: &'static str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::from_timestamp(secs, 0);
    if parsed.is_none() {
        warn!("invalid timestamp {} in database during {}", secs, operation);
    }
    parsed
}

fn parse_status(value: &str, operation: &'static str) -> Result<PrStatus, StoreError> {
    PrStatus::parse(value).ok_or_else(|| {
        StoreError::storage(
            operation,
            format!("invalid pull request status '{}' in database", value),
        )
    })
}

#[async_trait]
impl Directory for SqliteStore {
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let name = name.to_string();
        let members = members.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::storage("create_team", e.to_string()))?;

            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?1)",
                    params![name],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::storage("create_team", e.to_string()))?;
            if exists {
                return Err(StoreError::TeamExists);
            }

            let now = now_secs();
            tx.execute(
                "INSERT INTO teams (team_name, created_at) VALUES (?1, ?2)",
                params![name, now],
            )
            .map_err(|e| StoreError::storage("create_team", e.to_string()))?;

            // Upsert each member: a user id already known elsewhere is
            // re-parented onto this team, last write wins.
            for member in &members {
                tx.execute(
                    "INSERT INTO users (user_id, username, team_name, is_active, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(user_id) DO UPDATE SET
                         username = excluded.username,
                         team_name = excluded.team_name,
                         is_active = excluded.is_active,
                         updated_at = excluded.updated_at",
                    params![member.user_id, member.username, name, member.is_active, now],
                )
                .map_err(|e| StoreError::storage("create_team", e.to_string()))?;
            }

            tx.commit()
                .map_err(|e| StoreError::storage("create_team", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("create_team", e.to_string()))?
    }

    async fn get_team(&self, name: &str) -> Result<Team, StoreError> {
        let conn = self.conn.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT user_id, username, is_active FROM users
                     WHERE team_name = ?1 ORDER BY user_id",
                )
                .map_err(|e| StoreError::storage("get_team", e.to_string()))?;

            let members = stmt
                .query_map(params![name], |row| {
                    Ok(TeamMember {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                })
                .map_err(|e| StoreError::storage("get_team", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("get_team", e.to_string()))?;

            if members.is_empty() {
                // A team may legitimately have no members; only report
                // TeamNotFound when the team row itself is absent.
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?1)",
                        params![name],
                        |row| row.get(0),
                    )
                    .map_err(|e| StoreError::storage("get_team", e.to_string()))?;
                if !exists {
                    return Err(StoreError::TeamNotFound);
                }
            }

            Ok(Team {
                team_name: name,
                members,
            })
        })
        .await
        .map_err(|e| StoreError::storage("get_team", e.to_string()))?
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        team_name: row.get(2)?,
                        is_active: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::storage("get_user", e.to_string()))?
            .ok_or(StoreError::UserNotFound)
        })
        .await
        .map_err(|e| StoreError::storage("get_user", e.to_string()))?
    }

    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<User, StoreError> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let updated = conn
                .execute(
                    "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE user_id = ?3",
                    params![active, now_secs(), user_id],
                )
                .map_err(|e| StoreError::storage("set_user_active", e.to_string()))?;
            if updated == 0 {
                return Err(StoreError::UserNotFound);
            }

            conn.query_row(
                "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        team_name: row.get(2)?,
                        is_active: row.get(3)?,
                    })
                },
            )
            .map_err(|e| StoreError::storage("set_user_active", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("set_user_active", e.to_string()))?
    }

    async fn active_team_members(
        &self,
        team_name: &str,
        exclude_user: &str,
    ) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.clone();
        let team_name = team_name.to_string();
        let exclude_user = exclude_user.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, username, team_name, is_active FROM users
                     WHERE team_name = ?1 AND is_active = 1 AND user_id != ?2
                     ORDER BY user_id",
                )
                .map_err(|e| StoreError::storage("active_team_members", e.to_string()))?;

            let members = stmt
                .query_map(params![team_name, exclude_user], |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        team_name: row.get(2)?,
                        is_active: row.get(3)?,
                    })
                })
                .map_err(|e| StoreError::storage("active_team_members", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("active_team_members", e.to_string()))?;
            Ok(members)
        })
        .await
        .map_err(|e| StoreError::storage("active_team_members", e.to_string()))?
    }

    async fn user_team(&self, user_id: &str) -> Result<String, StoreError> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT team_name FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("user_team", e.to_string()))?
            .ok_or(StoreError::UserNotFound)
        })
        .await
        .map_err(|e| StoreError::storage("user_team", e.to_string()))?
    }

    async fn active_member_ids(&self, team_name: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.clone();
        let team_name = team_name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT user_id FROM users
                     WHERE team_name = ?1 AND is_active = 1
                     ORDER BY user_id",
                )
                .map_err(|e| StoreError::storage("active_member_ids", e.to_string()))?;

            let ids = stmt
                .query_map(params![team_name], |row| row.get(0))
                .map_err(|e| StoreError::storage("active_member_ids", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("active_member_ids", e.to_string()))?;
            Ok(ids)
        })
        .await
        .map_err(|e| StoreError::storage("active_member_ids", e.to_string()))?
    }

    async fn deactivate_team(&self, team_name: &str) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let team_name = team_name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "UPDATE users SET is_active = 0, updated_at = ?1
                 WHERE team_name = ?2 AND is_active = 1",
                params![now_secs(), team_name],
            )
            .map_err(|e| StoreError::storage("deactivate_team", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("deactivate_team", e.to_string()))?
    }
}

#[async_trait]
impl PullRequestStore for SqliteStore {
    async fn pull_request_exists(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::storage("pull_request_exists", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("pull_request_exists", e.to_string()))?
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let pr = pr.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))?;

            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?1)",
                    params![pr.pull_request_id],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))?;
            if exists {
                return Err(StoreError::PullRequestExists);
            }

            tx.execute(
                "INSERT INTO pull_requests
                     (pull_request_id, pull_request_name, author_id, status,
                      need_more_reviewers, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pr.pull_request_id,
                    pr.pull_request_name,
                    pr.author_id,
                    pr.status.as_str(),
                    pr.need_more_reviewers,
                    now_secs()
                ],
            )
            .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))?;

            for reviewer_id in &pr.assigned_reviewers {
                tx.execute(
                    "INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id)
                     VALUES (?1, ?2)",
                    params![pr.pull_request_id, reviewer_id],
                )
                .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))?;
            }

            tx.commit()
                .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("create_pull_request", e.to_string()))?
    }

    async fn get_pull_request(&self, id: &str) -> Result<PullRequest, StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let row: Option<(String, String, String, String, bool, i64, Option<i64>)> = conn
                .query_row(
                    "SELECT pull_request_id, pull_request_name, author_id, status,
                            need_more_reviewers, created_at, merged_at
                     FROM pull_requests WHERE pull_request_id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| StoreError::storage("get_pull_request", e.to_string()))?;

            let Some((pr_id, name, author_id, status, need_more, created_at, merged_at)) = row
            else {
                return Err(StoreError::PullRequestNotFound);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT reviewer_id FROM pull_request_reviewers
                     WHERE pull_request_id = ?1 ORDER BY reviewer_id",
                )
                .map_err(|e| StoreError::storage("get_pull_request", e.to_string()))?;
            let reviewers = stmt
                .query_map(params![pr_id], |row| row.get(0))
                .map_err(|e| StoreError::storage("get_pull_request", e.to_string()))?
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| StoreError::storage("get_pull_request", e.to_string()))?;

            Ok(PullRequest {
                pull_request_id: pr_id,
                pull_request_name: name,
                author_id,
                status: parse_status(&status, "get_pull_request")?,
                assigned_reviewers: reviewers,
                need_more_reviewers: need_more,
                created_at: secs_to_datetime(created_at, "get_pull_request"),
                merged_at: merged_at.and_then(|s| secs_to_datetime(s, "get_pull_request")),
            })
        })
        .await
        .map_err(|e| StoreError::storage("get_pull_request", e.to_string()))?
    }

    async fn merge(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let updated = conn
                .execute(
                    "UPDATE pull_requests SET status = 'MERGED', merged_at = ?1
                     WHERE pull_request_id = ?2 AND status = 'OPEN'",
                    params![now_secs(), id],
                )
                .map_err(|e| StoreError::storage("merge", e.to_string()))?;

            if updated == 0 {
                // Either the id is unknown or the pull request is already
                // merged; the latter is an idempotent success.
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?1)",
                        params![id],
                        |row| row.get(0),
                    )
                    .map_err(|e| StoreError::storage("merge", e.to_string()))?;
                if !exists {
                    return Err(StoreError::PullRequestNotFound);
                }
            }

            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("merge", e.to_string()))?
    }

    async fn swap_reviewer(
        &self,
        id: &str,
        old_reviewer: &str,
        new_reviewer: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let old_reviewer = old_reviewer.to_string();
        let new_reviewer = new_reviewer.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))?;

            let assigned: bool = tx
                .query_row(
                    "SELECT EXISTS(
                         SELECT 1 FROM pull_request_reviewers
                         WHERE pull_request_id = ?1 AND reviewer_id = ?2
                     )",
                    params![id, old_reviewer],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))?;
            if !assigned {
                return Err(StoreError::NotAssigned);
            }

            tx.execute(
                "DELETE FROM pull_request_reviewers
                 WHERE pull_request_id = ?1 AND reviewer_id = ?2",
                params![id, old_reviewer],
            )
            .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))?;

            tx.execute(
                "INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id)
                 VALUES (?1, ?2)",
                params![id, new_reviewer],
            )
            .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))?;

            tx.commit()
                .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("swap_reviewer", e.to_string()))?
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestSummary>, StoreError> {
        let conn = self.conn.clone();
        let reviewer_id = reviewer_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.status
                     FROM pull_requests pr
                     INNER JOIN pull_request_reviewers prr
                         ON pr.pull_request_id = prr.pull_request_id
                     WHERE prr.reviewer_id = ?1
                     ORDER BY pr.created_at DESC, pr.rowid DESC",
                )
                .map_err(|e| StoreError::storage("list_by_reviewer", e.to_string()))?;

            let rows = stmt
                .query_map(params![reviewer_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| StoreError::storage("list_by_reviewer", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list_by_reviewer", e.to_string()))?;

            rows.into_iter()
                .map(|(pr_id, name, author_id, status)| {
                    Ok(PullRequestSummary {
                        pull_request_id: pr_id,
                        pull_request_name: name,
                        author_id,
                        status: parse_status(&status, "list_by_reviewer")?,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| StoreError::storage("list_by_reviewer", e.to_string()))?
    }

    async fn open_with_any_reviewer(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if reviewer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.clone();
        let reviewer_ids = reviewer_ids.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            // SQLite caps host parameters per statement, so large id sets
            // are queried in chunks. A pull request whose reviewers span
            // chunks would match more than once, hence the set.
            let mut matched = BTreeSet::new();
            for chunk in reviewer_ids.chunks(MAX_QUERY_PARAMS) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let query = format!(
                    "SELECT DISTINCT pr.pull_request_id
                     FROM pull_requests pr
                     INNER JOIN pull_request_reviewers prr
                         ON pr.pull_request_id = prr.pull_request_id
                     WHERE pr.status = 'OPEN' AND prr.reviewer_id IN ({placeholders})"
                );

                let mut stmt = conn
                    .prepare(&query)
                    .map_err(|e| StoreError::storage("open_with_any_reviewer", e.to_string()))?;

                let ids: Vec<String> = stmt
                    .query_map(params_from_iter(chunk.iter()), |row| row.get(0))
                    .map_err(|e| StoreError::storage("open_with_any_reviewer", e.to_string()))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StoreError::storage("open_with_any_reviewer", e.to_string()))?;
                matched.extend(ids);
            }

            Ok(matched.into_iter().collect())
        })
        .await
        .map_err(|e| StoreError::storage("open_with_any_reviewer", e.to_string()))?
    }

    async fn user_review_stats(&self) -> Result<Vec<UserReviewStats>, StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT
                         u.user_id,
                         u.username,
                         COUNT(prr.reviewer_id) AS total_assignments,
                         COUNT(CASE WHEN pr.status = 'OPEN' THEN 1 END) AS open_assignments,
                         COUNT(CASE WHEN pr.status = 'MERGED' THEN 1 END) AS merged_assignments
                     FROM users u
                     LEFT JOIN pull_request_reviewers prr ON u.user_id = prr.reviewer_id
                     LEFT JOIN pull_requests pr ON prr.pull_request_id = pr.pull_request_id
                     GROUP BY u.user_id, u.username
                     ORDER BY total_assignments DESC, u.user_id",
                )
                .map_err(|e| StoreError::storage("user_review_stats", e.to_string()))?;

            let stats = stmt
                .query_map([], |row| {
                    Ok(UserReviewStats {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        total_assignments: row.get(2)?,
                        open_assignments: row.get(3)?,
                        merged_assignments: row.get(4)?,
                    })
                })
                .map_err(|e| StoreError::storage("user_review_stats", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("user_review_stats", e.to_string()))?;
            Ok(stats)
        })
        .await
        .map_err(|e| StoreError::storage("user_review_stats", e.to_string()))?
    }

    async fn pr_stats(&self) -> Result<PrStats, StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT
                     COUNT(*) AS total_prs,
                     COUNT(CASE WHEN status = 'OPEN' THEN 1 END) AS open_prs,
                     COUNT(CASE WHEN status = 'MERGED' THEN 1 END) AS merged_prs,
                     (SELECT COUNT(*) FROM pull_request_reviewers) AS total_assignments
                 FROM pull_requests",
                [],
                |row| {
                    Ok(PrStats {
                        total_prs: row.get(0)?,
                        open_prs: row.get(1)?,
                        merged_prs: row.get(2)?,
                        total_assignments: row.get(3)?,
                    })
                },
            )
            .map_err(|e| StoreError::storage("pr_stats", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("pr_stats", e.to_string()))?
    }
}

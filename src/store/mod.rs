//! Storage abstraction for teams, users, and pull requests.
//!
//! Two traits split the persistent state by owner: `Directory` owns team and
//! user rows, `PullRequestStore` owns pull request and reviewer-assignment
//! rows. Implementations provide different backends (in-memory, SQLite); a
//! single backend instance typically implements both traits so the engine
//! can read a consistent view through one store.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    PrStats, PullRequest, PullRequestSummary, Team, TeamMember, User, UserReviewStats,
};

/// Errors surfaced by storage backends.
///
/// Entity-absence and collision cases are first-class variants so callers can
/// map them to structured responses; everything else (I/O, corruption) is
/// reported through `Storage`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("team not found")]
    TeamNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("pull request not found")]
    PullRequestNotFound,

    #[error("team already exists")]
    TeamExists,

    #[error("pull request id already exists")]
    PullRequestExists,

    #[error("reviewer is not assigned to this pull request")]
    NotAssigned,

    #[error("storage failure during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Storage {
            operation,
            message: message.into(),
        }
    }
}

/// Owner of team and user rows.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Create a team and upsert every listed member as a user bound to it.
    ///
    /// Fails with `TeamExists` if the name is already taken. Member upserts
    /// overwrite username, active flag, and team for already-known user ids,
    /// which is how a user moves between teams.
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<(), StoreError>;

    /// Get a team with its members ordered by user id.
    ///
    /// Fails with `TeamNotFound` only if no team row exists and no user
    /// references the name.
    async fn get_team(&self, name: &str) -> Result<Team, StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError>;

    /// Flip a user's active flag and return the updated record.
    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<User, StoreError>;

    /// All active users in a team except `exclude_user`.
    ///
    /// Ordering is not significant; callers randomize before selection.
    async fn active_team_members(
        &self,
        team_name: &str,
        exclude_user: &str,
    ) -> Result<Vec<User>, StoreError>;

    /// The team a user belongs to.
    async fn user_team(&self, user_id: &str) -> Result<String, StoreError>;

    /// Ids of the currently-active members of a team.
    async fn active_member_ids(&self, team_name: &str) -> Result<Vec<String>, StoreError>;

    /// Deactivate every active member of a team in one operation.
    async fn deactivate_team(&self, team_name: &str) -> Result<(), StoreError>;
}

/// Owner of pull request and reviewer-assignment rows.
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    async fn pull_request_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Persist a pull request and all of its initial reviewer assignments
    /// atomically (all-or-nothing). Fails with `PullRequestExists` on an id
    /// collision.
    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), StoreError>;

    /// Fetch a pull request with its reviewer set ordered by reviewer id.
    async fn get_pull_request(&self, id: &str) -> Result<PullRequest, StoreError>;

    /// Transition OPEN → MERGED and stamp the merge time.
    ///
    /// Merging an already-MERGED pull request is a no-op success; an unknown
    /// id fails with `PullRequestNotFound`.
    async fn merge(&self, id: &str) -> Result<(), StoreError>;

    /// Replace one reviewer with another atomically (remove + insert, both
    /// or neither). Fails with `NotAssigned` if `old_reviewer` is not on the
    /// pull request.
    async fn swap_reviewer(
        &self,
        id: &str,
        old_reviewer: &str,
        new_reviewer: &str,
    ) -> Result<(), StoreError>;

    /// Summaries of every pull request where the user is an assigned
    /// reviewer, newest-created first.
    async fn list_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestSummary>, StoreError>;

    /// Ids of OPEN pull requests with at least one reviewer in the given
    /// set, without duplicates.
    async fn open_with_any_reviewer(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Per-user assignment counts, every user included, ordered by total
    /// assignments descending then user id.
    async fn user_review_stats(&self) -> Result<Vec<UserReviewStats>, StoreError>;

    /// Global pull request and assignment counts.
    async fn pr_stats(&self) -> Result<PrStats, StoreError>;
}

//! Reviewer assignment engine.
//!
//! This is the decision core of the service: candidate selection, exclusion
//! filtering, uniformly-random picks, and the lifecycle transitions around
//! pull requests (open → merged) and bulk team deactivation with reviewer
//! hand-off. The engine holds no state of its own; every call reads fresh
//! snapshots from the stores and commits effects back through them, so
//! candidate lists and reviewer sets are never cached between calls.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{PrStatus, PullRequest, PullRequestSummary, Statistics, Team, User};
use crate::store::{Directory, PullRequestStore, StoreError};

/// Number of reviewers assigned at pull request creation when enough
/// candidates exist.
const TARGET_REVIEWER_COUNT: usize = 2;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("team_name already exists")]
    TeamExists,

    #[error("pull request id already exists")]
    PullRequestExists,

    #[error("cannot reassign reviewers on a merged pull request")]
    PullRequestMerged,

    #[error("reviewer is not assigned to this pull request")]
    NotAssigned,

    #[error("no active replacement candidate in team")]
    NoCandidate,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TeamNotFound => EngineError::NotFound("team"),
            StoreError::UserNotFound => EngineError::NotFound("user"),
            StoreError::PullRequestNotFound => EngineError::NotFound("pull request"),
            StoreError::TeamExists => EngineError::TeamExists,
            StoreError::PullRequestExists => EngineError::PullRequestExists,
            StoreError::NotAssigned => EngineError::NotAssigned,
            other => EngineError::Store(other),
        }
    }
}

/// Stateless coordinator over the directory and pull request stores.
#[derive(Clone)]
pub struct Engine {
    directory: Arc<dyn Directory>,
    pull_requests: Arc<dyn PullRequestStore>,
}

impl Engine {
    pub fn new(directory: Arc<dyn Directory>, pull_requests: Arc<dyn PullRequestStore>) -> Self {
        Self {
            directory,
            pull_requests,
        }
    }

    // =========================================================================
    // Teams and users
    // =========================================================================

    /// Create a team and register its members, then return the stored team
    /// (members ordered by user id).
    pub async fn create_team(&self, team: Team) -> Result<Team, EngineError> {
        self.directory
            .create_team(&team.team_name, &team.members)
            .await?;
        Ok(self.directory.get_team(&team.team_name).await?)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, EngineError> {
        Ok(self.directory.get_team(team_name).await?)
    }

    /// Flip a single user's active flag.
    ///
    /// Deliberately does NOT reassign any of the user's existing review
    /// assignments; only the team-wide `bulk_deactivate_team` path hands
    /// reviews off.
    pub async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
    ) -> Result<User, EngineError> {
        Ok(self.directory.set_user_active(user_id, active).await?)
    }

    // =========================================================================
    // Pull requests
    // =========================================================================

    /// Create a pull request and assign up to two reviewers from the
    /// author's team, chosen uniformly at random.
    ///
    /// Assignment is one-shot: if fewer than two candidates exist the pull
    /// request is created with whatever is available and
    /// `need_more_reviewers` set; there is no later top-up.
    pub async fn create_pull_request(
        &self,
        pr_id: &str,
        pr_name: &str,
        author_id: &str,
    ) -> Result<PullRequest, EngineError> {
        if self.pull_requests.pull_request_exists(pr_id).await? {
            return Err(EngineError::PullRequestExists);
        }

        let author = self
            .directory
            .get_user(author_id)
            .await
            .map_err(|err| match err {
                StoreError::UserNotFound => EngineError::NotFound("author or team"),
                other => other.into(),
            })?;

        let candidates = self
            .directory
            .active_team_members(&author.team_name, author_id)
            .await?;
        let reviewers = select_initial_reviewers(&candidates, TARGET_REVIEWER_COUNT);
        let need_more_reviewers = reviewers.len() < TARGET_REVIEWER_COUNT;

        let pr = PullRequest {
            pull_request_id: pr_id.to_string(),
            pull_request_name: pr_name.to_string(),
            author_id: author_id.to_string(),
            status: PrStatus::Open,
            assigned_reviewers: reviewers,
            need_more_reviewers,
            created_at: None,
            merged_at: None,
        };
        self.pull_requests.create_pull_request(&pr).await?;

        // Re-read so the response carries store-stamped fields (timestamps,
        // reviewer ordering).
        Ok(self.pull_requests.get_pull_request(pr_id).await?)
    }

    /// Merge a pull request. Merging an already-merged pull request is a
    /// success without mutation.
    pub async fn merge_pull_request(&self, pr_id: &str) -> Result<PullRequest, EngineError> {
        self.pull_requests.merge(pr_id).await?;
        Ok(self.pull_requests.get_pull_request(pr_id).await?)
    }

    /// Replace one assigned reviewer with a random active member of the old
    /// reviewer's team.
    ///
    /// The candidate pool excludes the pull request author, the old reviewer,
    /// and everyone currently assigned. Returns the updated pull request and
    /// the id of the reviewer swapped in.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<(PullRequest, String), EngineError> {
        let pr = self.pull_requests.get_pull_request(pr_id).await?;

        if pr.status == PrStatus::Merged {
            return Err(EngineError::PullRequestMerged);
        }

        if !pr.assigned_reviewers.iter().any(|r| r == old_reviewer_id) {
            return Err(EngineError::NotAssigned);
        }

        // The replacement is searched in the departing reviewer's own team,
        // not the author's.
        let old_reviewer_team = self
            .directory
            .user_team(old_reviewer_id)
            .await
            .map_err(|err| match err {
                StoreError::UserNotFound => EngineError::NotFound("old reviewer"),
                other => other.into(),
            })?;

        let candidates = self
            .directory
            .active_team_members(&old_reviewer_team, old_reviewer_id)
            .await?;
        let assigned: HashSet<&str> = pr.assigned_reviewers.iter().map(String::as_str).collect();
        let pool: Vec<&User> = candidates
            .iter()
            .filter(|c| c.user_id != pr.author_id && !assigned.contains(c.user_id.as_str()))
            .collect();

        let new_reviewer_id = pick_one(&pool).ok_or(EngineError::NoCandidate)?;

        self.pull_requests
            .swap_reviewer(pr_id, old_reviewer_id, &new_reviewer_id)
            .await?;

        let updated = self.pull_requests.get_pull_request(pr_id).await?;
        Ok((updated, new_reviewer_id))
    }

    /// Pull requests where the user is an assigned reviewer, newest first.
    pub async fn reviews_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PullRequestSummary>, EngineError> {
        // Distinguish an unknown user from a reviewer with no assignments.
        self.directory.get_user(user_id).await?;
        Ok(self.pull_requests.list_by_reviewer(user_id).await?)
    }

    // =========================================================================
    // Bulk deactivation
    // =========================================================================

    /// Deactivate every active member of a team, handing their open review
    /// assignments off first.
    ///
    /// Replacements are drawn from each pull request AUTHOR's team: when an
    /// entire team departs, its own roster has nobody left to take over. The
    /// departing set is snapshotted before any write and excluded from every
    /// candidate pool, so no reviewer about to be deactivated can be swapped
    /// in. Deactivation itself happens only after all reassignment attempts,
    /// as one operation.
    ///
    /// A slot with no eligible replacement keeps its (now inactive) reviewer;
    /// that sub-case is silent by design. Returns the deactivated user ids
    /// and the ids of pull requests that had at least one successful
    /// reassignment.
    pub async fn bulk_deactivate_team(
        &self,
        team_name: &str,
    ) -> Result<(Vec<String>, Vec<String>), EngineError> {
        self.directory.get_team(team_name).await?;

        let deactivated = self.directory.active_member_ids(team_name).await?;
        if deactivated.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let departing: HashSet<&str> = deactivated.iter().map(String::as_str).collect();

        let affected = self
            .pull_requests
            .open_with_any_reviewer(&deactivated)
            .await?;

        let mut reassigned_prs = Vec::new();
        for pr_id in affected {
            let pr = match self.pull_requests.get_pull_request(&pr_id).await {
                Ok(pr) => pr,
                Err(err) => {
                    warn!("skipping pull request {} during deactivation: {}", pr_id, err);
                    continue;
                }
            };
            let author = match self.directory.get_user(&pr.author_id).await {
                Ok(author) => author,
                Err(err) => {
                    warn!(
                        "skipping pull request {}: author {} lookup failed: {}",
                        pr_id, pr.author_id, err
                    );
                    continue;
                }
            };

            let candidates = self
                .directory
                .active_team_members(&author.team_name, &author.user_id)
                .await?;

            // Track the live reviewer set across swaps within this pull
            // request, so a replacement picked for one slot cannot be picked
            // again for the next.
            let mut current: BTreeSet<String> = pr.assigned_reviewers.iter().cloned().collect();
            let mut swapped_any = false;

            for reviewer_id in &pr.assigned_reviewers {
                if !departing.contains(reviewer_id.as_str()) {
                    continue;
                }

                let pool: Vec<&User> = candidates
                    .iter()
                    .filter(|c| {
                        !current.contains(&c.user_id) && !departing.contains(c.user_id.as_str())
                    })
                    .collect();

                let Some(replacement) = pick_one(&pool) else {
                    // No eligible replacement: the departing reviewer stays
                    // assigned, by design.
                    continue;
                };

                match self
                    .pull_requests
                    .swap_reviewer(&pr_id, reviewer_id, &replacement)
                    .await
                {
                    Ok(()) => {
                        current.remove(reviewer_id);
                        current.insert(replacement);
                        swapped_any = true;
                    }
                    Err(err) => {
                        warn!(
                            "failed to reassign reviewer {} on pull request {}: {}",
                            reviewer_id, pr_id, err
                        );
                    }
                }
            }

            if swapped_any {
                reassigned_prs.push(pr_id);
            }
        }

        self.directory.deactivate_team(team_name).await?;
        info!(
            "deactivated {} users of team {}, reassigned reviewers on {} pull requests",
            deactivated.len(),
            team_name,
            reassigned_prs.len()
        );

        Ok((deactivated, reassigned_prs))
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Per-user and global assignment counts. Pure aggregation.
    pub async fn statistics(&self) -> Result<Statistics, EngineError> {
        let user_stats = self.pull_requests.user_review_stats().await?;
        let pr_stats = self.pull_requests.pr_stats().await?;
        Ok(Statistics {
            user_stats,
            pr_stats,
        })
    }
}

/// Pick up to `max_count` reviewers uniformly at random without replacement.
///
/// Shuffle-then-take, so every permutation of the candidate list is equally
/// likely. A fresh generator per call avoids correlated picks across rapid
/// successive calls.
fn select_initial_reviewers(candidates: &[User], max_count: usize) -> Vec<String> {
    let mut ids: Vec<String> = candidates.iter().map(|u| u.user_id.clone()).collect();
    let mut rng = rand::rng();
    ids.shuffle(&mut rng);
    ids.truncate(max_count);
    ids
}

/// Pick one candidate uniformly at random, or `None` for an empty pool.
fn pick_one(pool: &[&User]) -> Option<String> {
    let mut rng = rand::rng();
    pool.choose(&mut rng).map(|u| u.user_id.clone())
}

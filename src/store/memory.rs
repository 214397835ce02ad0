//! In-memory implementation of `Directory` and `PullRequestStore`.
//!
//! All state is held in memory behind a single `RwLock` and lost on restart.
//! Because every operation takes the one lock, multi-entity mutations are
//! just as atomic as the SQLite backend's transactions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Directory, PullRequestStore, StoreError};
use crate::models::{
    PrStats, PrStatus, PullRequest, PullRequestSummary, Team, TeamMember, User, UserReviewStats,
};

#[derive(Debug, Clone)]
struct StoredPullRequest {
    pull_request_name: String,
    author_id: String,
    status: PrStatus,
    need_more_reviewers: bool,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    reviewers: BTreeSet<String>,
    /// Monotonic creation sequence; timestamps alone cannot break ties
    /// between pull requests created within the same second.
    created_seq: u64,
}

#[derive(Default)]
struct Inner {
    teams: BTreeSet<String>,
    /// Keyed by user id; BTreeMap iteration gives the id ordering the
    /// directory operations promise.
    users: BTreeMap<String, User>,
    pull_requests: HashMap<String, StoredPullRequest>,
    next_seq: u64,
}

/// In-memory store, primarily for tests and ephemeral runs.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_pull_request(id: &str, stored: &StoredPullRequest) -> PullRequest {
    PullRequest {
        pull_request_id: id.to_string(),
        pull_request_name: stored.pull_request_name.clone(),
        author_id: stored.author_id.clone(),
        status: stored.status,
        assigned_reviewers: stored.reviewers.iter().cloned().collect(),
        need_more_reviewers: stored.need_more_reviewers,
        created_at: Some(stored.created_at),
        merged_at: stored.merged_at,
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.teams.contains(name) {
            return Err(StoreError::TeamExists);
        }
        inner.teams.insert(name.to_string());
        for member in members {
            inner.users.insert(
                member.user_id.clone(),
                User {
                    user_id: member.user_id.clone(),
                    username: member.username.clone(),
                    team_name: name.to_string(),
                    is_active: member.is_active,
                },
            );
        }
        Ok(())
    }

    async fn get_team(&self, name: &str) -> Result<Team, StoreError> {
        let inner = self.inner.read().await;
        let members: Vec<TeamMember> = inner
            .users
            .values()
            .filter(|u| u.team_name == name)
            .map(|u| TeamMember {
                user_id: u.user_id.clone(),
                username: u.username.clone(),
                is_active: u.is_active,
            })
            .collect();

        if members.is_empty() && !inner.teams.contains(name) {
            return Err(StoreError::TeamNotFound);
        }

        Ok(Team {
            team_name: name.to_string(),
            members,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(user_id)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or(StoreError::UserNotFound)?;
        user.is_active = active;
        Ok(user.clone())
    }

    async fn active_team_members(
        &self,
        team_name: &str,
        exclude_user: &str,
    ) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| u.team_name == team_name && u.is_active && u.user_id != exclude_user)
            .cloned()
            .collect())
    }

    async fn user_team(&self, user_id: &str) -> Result<String, StoreError> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(user_id)
            .map(|u| u.team_name.clone())
            .ok_or(StoreError::UserNotFound)
    }

    async fn active_member_ids(&self, team_name: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| u.team_name == team_name && u.is_active)
            .map(|u| u.user_id.clone())
            .collect())
    }

    async fn deactivate_team(&self, team_name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for user in inner.users.values_mut() {
            if user.team_name == team_name {
                user.is_active = false;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestStore for InMemoryStore {
    async fn pull_request_exists(&self, id: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.pull_requests.contains_key(id))
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(StoreError::PullRequestExists);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pull_requests.insert(
            pr.pull_request_id.clone(),
            StoredPullRequest {
                pull_request_name: pr.pull_request_name.clone(),
                author_id: pr.author_id.clone(),
                status: pr.status,
                need_more_reviewers: pr.need_more_reviewers,
                created_at: Utc::now(),
                merged_at: None,
                reviewers: pr.assigned_reviewers.iter().cloned().collect(),
                created_seq: seq,
            },
        );
        Ok(())
    }

    async fn get_pull_request(&self, id: &str) -> Result<PullRequest, StoreError> {
        let inner = self.inner.read().await;
        inner
            .pull_requests
            .get(id)
            .map(|stored| to_pull_request(id, stored))
            .ok_or(StoreError::PullRequestNotFound)
    }

    async fn merge(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .pull_requests
            .get_mut(id)
            .ok_or(StoreError::PullRequestNotFound)?;
        if stored.status == PrStatus::Open {
            stored.status = PrStatus::Merged;
            stored.merged_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn swap_reviewer(
        &self,
        id: &str,
        old_reviewer: &str,
        new_reviewer: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .pull_requests
            .get_mut(id)
            .ok_or(StoreError::PullRequestNotFound)?;
        if !stored.reviewers.remove(old_reviewer) {
            return Err(StoreError::NotAssigned);
        }
        stored.reviewers.insert(new_reviewer.to_string());
        Ok(())
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestSummary>, StoreError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<(&String, &StoredPullRequest)> = inner
            .pull_requests
            .iter()
            .filter(|(_, stored)| stored.reviewers.contains(reviewer_id))
            .collect();
        matched.sort_by(|a, b| b.1.created_seq.cmp(&a.1.created_seq));

        Ok(matched
            .into_iter()
            .map(|(id, stored)| PullRequestSummary {
                pull_request_id: id.clone(),
                pull_request_name: stored.pull_request_name.clone(),
                author_id: stored.author_id.clone(),
                status: stored.status,
            })
            .collect())
    }

    async fn open_with_any_reviewer(
        &self,
        reviewer_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner
            .pull_requests
            .iter()
            .filter(|(_, stored)| {
                stored.status == PrStatus::Open
                    && reviewer_ids.iter().any(|r| stored.reviewers.contains(r))
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn user_review_stats(&self) -> Result<Vec<UserReviewStats>, StoreError> {
        let inner = self.inner.read().await;
        let mut stats: Vec<UserReviewStats> = inner
            .users
            .values()
            .map(|user| {
                let mut total = 0;
                let mut open = 0;
                let mut merged = 0;
                for stored in inner.pull_requests.values() {
                    if stored.reviewers.contains(&user.user_id) {
                        total += 1;
                        match stored.status {
                            PrStatus::Open => open += 1,
                            PrStatus::Merged => merged += 1,
                        }
                    }
                }
                UserReviewStats {
                    user_id: user.user_id.clone(),
                    username: user.username.clone(),
                    total_assignments: total,
                    open_assignments: open,
                    merged_assignments: merged,
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            b.total_assignments
                .cmp(&a.total_assignments)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(stats)
    }

    async fn pr_stats(&self) -> Result<PrStats, StoreError> {
        let inner = self.inner.read().await;
        let total_prs = inner.pull_requests.len() as i64;
        let open_prs = inner
            .pull_requests
            .values()
            .filter(|p| p.status == PrStatus::Open)
            .count() as i64;
        let total_assignments = inner
            .pull_requests
            .values()
            .map(|p| p.reviewers.len() as i64)
            .sum();

        Ok(PrStats {
            total_prs,
            open_prs,
            merged_prs: total_prs - open_prs,
            total_assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: user_id.to_string(),
            username: format!("{}-name", user_id),
            is_active: active,
        }
    }

    fn open_pr(id: &str, author: &str, reviewers: &[&str]) -> PullRequest {
        PullRequest {
            pull_request_id: id.to_string(),
            pull_request_name: format!("{} title", id),
            author_id: author.to_string(),
            status: PrStatus::Open,
            assigned_reviewers: reviewers.iter().map(|r| r.to_string()).collect(),
            need_more_reviewers: reviewers.len() < 2,
            created_at: None,
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_team_orders_members_by_user_id() {
        let store = InMemoryStore::new();
        store
            .create_team("backend", &[member("u3", true), member("u1", true)])
            .await
            .unwrap();

        let team = store.get_team("backend").await.unwrap();
        let ids: Vec<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u3"]);
    }

    #[tokio::test]
    async fn test_duplicate_team_rejected() {
        let store = InMemoryStore::new();
        store.create_team("backend", &[]).await.unwrap();
        assert!(matches!(
            store.create_team("backend", &[]).await.unwrap_err(),
            StoreError::TeamExists
        ));
    }

    #[tokio::test]
    async fn test_merge_idempotent_and_swap_semantics() {
        let store = InMemoryStore::new();
        store
            .create_pull_request(&open_pr("pr-1", "u1", &["u2", "u3"]))
            .await
            .unwrap();

        store.merge("pr-1").await.unwrap();
        let first = store.get_pull_request("pr-1").await.unwrap();
        store.merge("pr-1").await.unwrap();
        let second = store.get_pull_request("pr-1").await.unwrap();
        assert_eq!(first.merged_at, second.merged_at);

        assert!(matches!(
            store.swap_reviewer("pr-1", "u9", "u4").await.unwrap_err(),
            StoreError::NotAssigned
        ));
        store.swap_reviewer("pr-1", "u2", "u4").await.unwrap();
        let pr = store.get_pull_request("pr-1").await.unwrap();
        assert_eq!(pr.assigned_reviewers, vec!["u3", "u4"]);
    }

    #[tokio::test]
    async fn test_list_by_reviewer_newest_first() {
        let store = InMemoryStore::new();
        store
            .create_pull_request(&open_pr("pr-a", "u1", &["u2"]))
            .await
            .unwrap();
        store
            .create_pull_request(&open_pr("pr-b", "u1", &["u2"]))
            .await
            .unwrap();

        let prs = store.list_by_reviewer("u2").await.unwrap();
        let ids: Vec<&str> = prs.iter().map(|p| p.pull_request_id.as_str()).collect();
        assert_eq!(ids, vec!["pr-b", "pr-a"]);
    }

    #[tokio::test]
    async fn test_stats_count_zero_assignment_users() {
        let store = InMemoryStore::new();
        store
            .create_team("backend", &[member("u1", true), member("u2", true)])
            .await
            .unwrap();
        store
            .create_pull_request(&open_pr("pr-1", "u1", &["u2"]))
            .await
            .unwrap();

        let stats = store.user_review_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].user_id, "u2");
        assert_eq!(stats[0].total_assignments, 1);
        assert_eq!(stats[1].total_assignments, 0);
    }
}

//! Tests for the SQLite store implementation.

use super::SqliteStore;
use crate::models::{PrStatus, PullRequest, TeamMember};
use crate::store::{Directory, PullRequestStore, StoreError};

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
async fn test_create_team_then_get() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_team("backend", &[member("u2", true), member("u1", true)])
        .await
        .unwrap();

    let team = store.get_team("backend").await.unwrap();
    assert_eq!(team.team_name, "backend");
    // Members come back ordered by user id, not by insertion order
    let ids: Vec<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
}

#[tokio::test]
async fn test_create_team_duplicate_name_fails() {
    let store = SqliteStore::new_in_memory().unwrap();

    store.create_team("backend", &[]).await.unwrap();
    let err = store.create_team("backend", &[]).await.unwrap_err();
    assert!(matches!(err, StoreError::TeamExists));
}

#[tokio::test]
async fn test_get_team_not_found() {
    let store = SqliteStore::new_in_memory().unwrap();
    let err = store.get_team("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::TeamNotFound));
}

#[tokio::test]
async fn test_empty_team_is_still_found() {
    let store = SqliteStore::new_in_memory().unwrap();
    store.create_team("backend", &[]).await.unwrap();

    let team = store.get_team("backend").await.unwrap();
    assert!(team.members.is_empty());
}

#[tokio::test]
async fn test_reused_user_id_is_reparented() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_team("backend", &[member("u1", true)])
        .await
        .unwrap();
    store
        .create_team("frontend", &[member("u1", false)])
        .await
        .unwrap();

    let user = store.get_user("u1").await.unwrap();
    assert_eq!(user.team_name, "frontend");
    assert!(!user.is_active);

    // The old team no longer lists the user
    let backend = store.get_team("backend").await.unwrap();
    assert!(backend.members.is_empty());
}

#[tokio::test]
async fn test_set_user_active() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_team("backend", &[member("u1", true)])
        .await
        .unwrap();

    let user = store.set_user_active("u1", false).await.unwrap();
    assert!(!user.is_active);

    let err = store.set_user_active("ghost", true).await.unwrap_err();
    assert!(matches!(err, StoreError::UserNotFound));
}

#[tokio::test]
async fn test_active_team_members_excludes_inactive_and_excluded() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_team(
            "backend",
            &[member("u1", true), member("u2", true), member("u3", false)],
        )
        .await
        .unwrap();

    let members = store.active_team_members("backend", "u1").await.unwrap();
    let ids: Vec<&str> = members.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec!["u2"]);
}

#[tokio::test]
async fn test_create_pull_request_persists_reviewers_atomically() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_team("backend", &[member("u1", true), member("u2", true)])
        .await
        .unwrap();

    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u3", "u2"]))
        .await
        .unwrap();

    let pr = store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(pr.status, PrStatus::Open);
    assert!(pr.created_at.is_some());
    assert!(pr.merged_at.is_none());
    // Reviewer set is ordered by reviewer id
    assert_eq!(pr.assigned_reviewers, vec!["u2", "u3"]);
}

#[tokio::test]
async fn test_create_pull_request_duplicate_id_fails() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_pull_request(&open_pr("pr-1", "u1", &[]))
        .await
        .unwrap();
    let err = store
        .create_pull_request(&open_pr("pr-1", "u1", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PullRequestExists));
}

#[tokio::test]
async fn test_merge_is_idempotent() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u2"]))
        .await
        .unwrap();

    store.merge("pr-1").await.unwrap();
    let merged = store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(merged.status, PrStatus::Merged);
    let merged_at = merged.merged_at;
    assert!(merged_at.is_some());

    // Second merge is a success without mutation
    store.merge("pr-1").await.unwrap();
    let again = store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(again.status, PrStatus::Merged);
    assert_eq!(again.merged_at, merged_at);
}

#[tokio::test]
async fn test_merge_unknown_pr_fails() {
    let store = SqliteStore::new_in_memory().unwrap();
    let err = store.merge("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::PullRequestNotFound));
}

#[tokio::test]
async fn test_swap_reviewer_replaces_exactly_one() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u2", "u3"]))
        .await
        .unwrap();

    store.swap_reviewer("pr-1", "u2", "u4").await.unwrap();

    let pr = store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(pr.assigned_reviewers, vec!["u3", "u4"]);
}

#[tokio::test]
async fn test_swap_reviewer_not_assigned() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u2"]))
        .await
        .unwrap();

    let err = store.swap_reviewer("pr-1", "u9", "u4").await.unwrap_err();
    assert!(matches!(err, StoreError::NotAssigned));

    // The reviewer set is untouched after the failed swap
    let pr = store.get_pull_request("pr-1").await.unwrap();
    assert_eq!(pr.assigned_reviewers, vec!["u2"]);
}

#[tokio::test]
async fn test_list_by_reviewer_newest_first() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_pull_request(&open_pr("pr-old", "u1", &["u2"]))
        .await
        .unwrap();
    store
        .create_pull_request(&open_pr("pr-new", "u1", &["u2"]))
        .await
        .unwrap();
    store
        .create_pull_request(&open_pr("pr-other", "u1", &["u3"]))
        .await
        .unwrap();

    let prs = store.list_by_reviewer("u2").await.unwrap();
    let ids: Vec<&str> = prs.iter().map(|p| p.pull_request_id.as_str()).collect();
    assert_eq!(ids, vec!["pr-new", "pr-old"]);
}

#[tokio::test]
async fn test_open_with_any_reviewer_skips_merged_and_dedupes() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u2", "u3"]))
        .await
        .unwrap();
    store
        .create_pull_request(&open_pr("pr-2", "u1", &["u2"]))
        .await
        .unwrap();
    store.merge("pr-2").await.unwrap();

    let ids = store
        .open_with_any_reviewer(&["u2".to_string(), "u3".to_string()])
        .await
        .unwrap();
    // pr-1 matches through both reviewers but appears once; pr-2 is merged
    assert_eq!(ids, vec!["pr-1".to_string()]);

    let none = store.open_with_any_reviewer(&[]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_open_with_any_reviewer_handles_large_id_sets() {
    let store = SqliteStore::new_in_memory().unwrap();

    store
        .create_pull_request(&open_pr("pr-1", "author", &["r-0000", "r-0500"]))
        .await
        .unwrap();

    // More ids than fit in one statement's parameter list, with the two
    // matching reviewers landing in different chunks; the result still
    // carries the pull request exactly once.
    let ids: Vec<String> = (0..501).map(|i| format!("r-{:04}", i)).collect();
    let matched = store.open_with_any_reviewer(&ids).await.unwrap();
    assert_eq!(matched, vec!["pr-1".to_string()]);
}

#[tokio::test]
async fn test_statistics_include_users_with_zero_assignments() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_team("backend", &[member("u1", true), member("u2", true)])
        .await
        .unwrap();

    store
        .create_pull_request(&open_pr("pr-1", "u1", &["u2"]))
        .await
        .unwrap();
    store
        .create_pull_request(&open_pr("pr-2", "u1", &["u2"]))
        .await
        .unwrap();
    store.merge("pr-2").await.unwrap();

    let stats = store.user_review_stats().await.unwrap();
    assert_eq!(stats.len(), 2);
    // Ordered by total assignments descending, then by user id
    assert_eq!(stats[0].user_id, "u2");
    assert_eq!(stats[0].total_assignments, 2);
    assert_eq!(stats[0].open_assignments, 1);
    assert_eq!(stats[0].merged_assignments, 1);
    assert_eq!(stats[1].user_id, "u1");
    assert_eq!(stats[1].total_assignments, 0);

    let pr_stats = store.pr_stats().await.unwrap();
    assert_eq!(pr_stats.total_prs, 2);
    assert_eq!(pr_stats.open_prs, 1);
    assert_eq!(pr_stats.merged_prs, 1);
    assert_eq!(pr_stats.total_assignments, 2);
}

#[tokio::test]
async fn test_deactivate_team_only_touches_that_team() {
    let store = SqliteStore::new_in_memory().unwrap();
    store
        .create_team("backend", &[member("u1", true), member("u2", false)])
        .await
        .unwrap();
    store
        .create_team("frontend", &[member("u3", true)])
        .await
        .unwrap();

    let active = store.active_member_ids("backend").await.unwrap();
    assert_eq!(active, vec!["u1".to_string()]);

    store.deactivate_team("backend").await.unwrap();

    assert!(store.active_member_ids("backend").await.unwrap().is_empty());
    assert!(store.get_user("u3").await.unwrap().is_active);
}

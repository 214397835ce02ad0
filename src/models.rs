//! Domain types shared by the store, the assignment engine, and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user as listed inside a team payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// A team and its members, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

/// A registered user. Each user belongs to exactly one team; re-adding a
/// known user id under a different team re-parents them (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// Pull request lifecycle status. OPEN → MERGED is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "MERGED")]
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(PrStatus::Open),
            "MERGED" => Some(PrStatus::Merged),
            _ => None,
        }
    }
}

/// A pull request with its currently assigned reviewers.
///
/// `assigned_reviewers` is always reported ordered by reviewer id, not by
/// insertion order. `need_more_reviewers` is fixed at creation time and never
/// updated afterwards, even if reviewers later become available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "needMoreReviewers")]
    pub need_more_reviewers: bool,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

/// Short form of a pull request, used when listing reviews for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
}

/// Per-user assignment counts. Every known user appears, including users
/// with zero assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReviewStats {
    pub user_id: String,
    pub username: String,
    pub total_assignments: i64,
    pub open_assignments: i64,
    pub merged_assignments: i64,
}

/// Global pull request counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrStats {
    pub total_prs: i64,
    pub open_prs: i64,
    pub merged_prs: i64,
    pub total_assignments: i64,
}

/// Aggregated reporting payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub user_stats: Vec<UserReviewStats>,
    pub pr_stats: PrStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_status_round_trips_through_str() {
        assert_eq!(PrStatus::parse(PrStatus::Open.as_str()), Some(PrStatus::Open));
        assert_eq!(
            PrStatus::parse(PrStatus::Merged.as_str()),
            Some(PrStatus::Merged)
        );
        assert_eq!(PrStatus::parse("CLOSED"), None);
    }

    #[test]
    fn pr_serializes_with_wire_field_names() {
        let pr = PullRequest {
            pull_request_id: "pr-1".to_string(),
            pull_request_name: "Add feature".to_string(),
            author_id: "u1".to_string(),
            status: PrStatus::Open,
            assigned_reviewers: vec!["u2".to_string()],
            need_more_reviewers: true,
            created_at: None,
            merged_at: None,
        };

        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["status"], "OPEN");
        assert_eq!(json["needMoreReviewers"], true);
        // Absent timestamps are omitted entirely rather than serialized as null
        assert!(json.get("createdAt").is_none());
        assert!(json.get("mergedAt").is_none());
    }
}

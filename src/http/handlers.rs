//! Request handlers and the structured error envelope.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::engine::EngineError;
use crate::models::Team;
use crate::AppState;

/// Machine-readable error code carried in every error envelope.
///
/// Historical quirk kept for wire compatibility: validation failures,
/// missing authentication, and internal errors all report `NOT_FOUND`;
/// clients distinguish them by HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TeamExists,
    PrExists,
    PrMerged,
    NotAssigned,
    NoCandidate,
    NotFound,
}

/// An error response: HTTP status plus a `{"error":{"code","message"}}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::NotFound, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TeamExists => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorCode::TeamExists,
                "team_name already exists",
            ),
            EngineError::PullRequestExists => Self::new(
                StatusCode::CONFLICT,
                ErrorCode::PrExists,
                "pull request id already exists",
            ),
            EngineError::PullRequestMerged => Self::new(
                StatusCode::CONFLICT,
                ErrorCode::PrMerged,
                "cannot reassign reviewers on a merged pull request",
            ),
            EngineError::NotAssigned => Self::new(
                StatusCode::CONFLICT,
                ErrorCode::NotAssigned,
                "reviewer is not assigned to this pull request",
            ),
            EngineError::NoCandidate => Self::new(
                StatusCode::CONFLICT,
                ErrorCode::NoCandidate,
                "no active replacement candidate in team",
            ),
            EngineError::NotFound(what) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                format!("{} not found", what),
            ),
            EngineError::Store(store_err) => {
                error!("storage failure: {}", store_err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::NotFound,
                    store_err.to_string(),
                )
            }
        }
    }
}

/// Unwrap a JSON body extraction, mapping malformed or missing bodies onto
/// the structured 400 envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn create_team(
    State(state): State<AppState>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<Response, ApiError> {
    let team = body(payload)?;
    require(&team.team_name, "team_name")?;
    for member in &team.members {
        require(&member.user_id, "members[].user_id")?;
    }

    let team = state.engine.create_team(team).await?;
    Ok((StatusCode::CREATED, Json(json!({"team": team}))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct GetTeamParams {
    #[serde(default)]
    team_name: String,
}

pub async fn get_team(
    State(state): State<AppState>,
    Query(params): Query<GetTeamParams>,
) -> Result<Json<Team>, ApiError> {
    require(&params.team_name, "team_name")?;
    let team = state.engine.get_team(&params.team_name).await?;
    Ok(Json(team))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeactivateRequest {
    team_name: String,
}

pub async fn bulk_deactivate(
    State(state): State<AppState>,
    payload: Result<Json<BulkDeactivateRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body(payload)?;
    require(&request.team_name, "team_name")?;

    let (deactivated, reassigned) = state
        .engine
        .bulk_deactivate_team(&request.team_name)
        .await?;
    Ok(Json(json!({
        "deactivated_user_ids": deactivated,
        "reassigned_prs": reassigned,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    user_id: String,
    is_active: bool,
}

pub async fn set_user_active(
    State(state): State<AppState>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body(payload)?;
    require(&request.user_id, "user_id")?;

    let user = state
        .engine
        .set_user_active(&request.user_id, request.is_active)
        .await?;
    Ok(Json(json!({"user": user})))
}

#[derive(Debug, Deserialize)]
pub struct GetReviewParams {
    #[serde(default)]
    user_id: String,
}

pub async fn get_review(
    State(state): State<AppState>,
    Query(params): Query<GetReviewParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&params.user_id, "user_id")?;

    let prs = state.engine.reviews_for_user(&params.user_id).await?;
    Ok(Json(json!({
        "user_id": params.user_id,
        "pull_requests": prs,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

pub async fn create_pull_request(
    State(state): State<AppState>,
    payload: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = body(payload)?;
    require(&request.pull_request_id, "pull_request_id")?;
    require(&request.pull_request_name, "pull_request_name")?;
    require(&request.author_id, "author_id")?;

    let pr = state
        .engine
        .create_pull_request(
            &request.pull_request_id,
            &request.pull_request_name,
            &request.author_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({"pr": pr}))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    pull_request_id: String,
}

pub async fn merge_pull_request(
    State(state): State<AppState>,
    payload: Result<Json<MergePullRequestRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body(payload)?;
    require(&request.pull_request_id, "pull_request_id")?;

    let pr = state
        .engine
        .merge_pull_request(&request.pull_request_id)
        .await?;
    Ok(Json(json!({"pr": pr})))
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pull_request_id: String,
    old_user_id: String,
}

pub async fn reassign_reviewer(
    State(state): State<AppState>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body(payload)?;
    require(&request.pull_request_id, "pull_request_id")?;
    require(&request.old_user_id, "old_user_id")?;

    let (pr, replaced_by) = state
        .engine
        .reassign_reviewer(&request.pull_request_id, &request.old_user_id)
        .await?;
    Ok(Json(json!({
        "pr": pr,
        "replaced_by": replaced_by,
    })))
}

pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<crate::models::Statistics>, ApiError> {
    let stats = state.engine.statistics().await?;
    Ok(Json(stats))
}

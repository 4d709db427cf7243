use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query, State,
    },
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::CurrentUser,
    models::{
        time_stats::{BookmarkTimeStats, TimeAnalytics, UserTimeStats},
        tracking_session::{SessionMetadata, SessionType, TrackingSession},
        SessionListQuery,
    },
    state::AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartSessionRequest {
    #[validate(custom(function = "crate::validation::rules::validate_identifier"))]
    pub bookmark_id: String,
    #[serde(default)]
    pub session_type: SessionType,
    /// Flat map of string keys to primitive values.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: SessionMetadata,
}

/// Ends one session, every active session of a bookmark, or everything the
/// caller has running, depending on which field is present.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct EndSessionRequest {
    #[validate(custom(function = "crate::validation::rules::validate_session_id"))]
    pub session_id: Option<String>,
    #[validate(custom(function = "crate::validation::rules::validate_identifier"))]
    pub bookmark_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndedSessionsResponse {
    pub message: String,
    pub ended_count: usize,
    pub sessions: Vec<TrackingSession>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EndSessionResponse {
    Session(TrackingSession),
    Bulk(EndedSessionsResponse),
}

/// Active session plus the seconds it has been running, for polling clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveSessionResponse {
    #[serde(flatten)]
    pub session: TrackingSession,
    pub elapsed_seconds: i64,
}

#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct ActiveSessionQuery {
    #[validate(custom(function = "crate::validation::rules::validate_identifier"))]
    pub bookmark_id: String,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct StatsQuery {
    pub bookmark_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum StatsResponse {
    Bookmark(BookmarkTimeStats),
    Analytics(TimeAnalytics),
    User(UserTimeStats),
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExternalVisitRequest {
    #[validate(custom(function = "crate::validation::rules::validate_identifier"))]
    pub bookmark_id: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: SessionMetadata,
}

pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<TrackingSession>, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let session = state
        .tracker
        .start_session(
            &payload.bookmark_id,
            user.id.as_str(),
            payload.session_type,
            payload.metadata,
        )
        .await?;
    Ok(Json(session))
}

pub async fn end_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<Json<EndSessionResponse>, AppError> {
    let payload = parse_end_request(&body)?;
    payload.validate()?;

    if let Some(session_id) = payload.session_id.as_deref() {
        let session = state.tracker.end_session(session_id, user.id.as_str()).await?;
        return Ok(Json(EndSessionResponse::Session(session)));
    }

    let sessions = match payload.bookmark_id.as_deref() {
        Some(bookmark_id) => {
            state
                .tracker
                .end_active_sessions_for_bookmark(bookmark_id, user.id.as_str())
                .await?
        }
        None => state.tracker.end_all_active_sessions(user.id.as_str()).await?,
    };

    Ok(Json(EndSessionResponse::Bulk(EndedSessionsResponse {
        message: format!("Ended {} active session(s)", sessions.len()),
        ended_count: sessions.len(),
        sessions,
    })))
}

pub async fn get_active_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    params: Result<Query<ActiveSessionQuery>, QueryRejection>,
) -> Result<Json<Option<ActiveSessionResponse>>, AppError> {
    let Query(params) = params?;
    params.validate()?;

    let session = state
        .tracker
        .get_active_session(&params.bookmark_id, user.id.as_str())
        .await?;
    Ok(Json(session.map(|session| ActiveSessionResponse {
        elapsed_seconds: state.tracker.elapsed_seconds(&session),
        session,
    })))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    params: Result<Query<SessionListQuery>, QueryRejection>,
) -> Result<Json<Vec<TrackingSession>>, AppError> {
    let Query(params) = params?;
    let sessions = state
        .tracker
        .list_bookmark_sessions(&params.bookmark_id, user.id.as_str(), params.limit())
        .await?;
    Ok(Json(sessions))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    params: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<StatsResponse>, AppError> {
    let Query(params) = params?;
    if let Some(bookmark_id) = params.bookmark_id.as_deref() {
        let stats = state
            .stats
            .get_bookmark_time_stats(bookmark_id, user.id.as_str())
            .await?;
        return Ok(Json(StatsResponse::Bookmark(stats)));
    }

    match (params.start_date, params.end_date) {
        (Some(start_date), Some(end_date)) => {
            let analytics = state
                .stats
                .get_time_analytics(user.id.as_str(), start_date, end_date)
                .await?;
            Ok(Json(StatsResponse::Analytics(analytics)))
        }
        (None, None) => {
            let stats = state.stats.get_user_time_stats(user.id.as_str()).await?;
            Ok(Json(StatsResponse::User(stats)))
        }
        _ => Err(AppError::BadRequest(
            "start_date and end_date must be provided together".into(),
        )),
    }
}

pub async fn track_external_visit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    payload: Result<Json<ExternalVisitRequest>, JsonRejection>,
) -> Result<Json<TrackingSession>, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let user_agent = extract_user_agent(&headers);
    let session = state
        .tracker
        .track_external_visit(
            &payload.bookmark_id,
            user.id.as_str(),
            payload.metadata,
            user_agent.as_deref(),
        )
        .await?;
    Ok(Json(session))
}

/// Clients commonly send `Content-Type: application/json` with no body at all;
/// a blank body means "end everything".
fn parse_end_request(body: &[u8]) -> Result<EndSessionRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(EndSessionRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("Invalid JSON body: {}", err)))
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
}

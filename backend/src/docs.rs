#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::{
        health::HealthResponse,
        time_tracking::{
            ActiveSessionQuery, ActiveSessionResponse, EndSessionRequest, EndSessionResponse, EndedSessionsResponse,
            ExternalVisitRequest, StartSessionRequest, StatsQuery, StatsResponse,
        },
    },
    models::{
        time_stats::{
            BookmarkTimeStats, BookmarkUsage, DailyUsage, SessionTypeUsage, TimeAnalytics,
            UserTimeStats,
        },
        tracking_session::{SessionType, TrackingSession},
        SessionListQuery,
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        start_session_doc,
        end_session_doc,
        active_session_doc,
        list_sessions_doc,
        stats_doc,
        external_visit_doc
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            // sessions
            SessionType,
            TrackingSession,
            ActiveSessionResponse,
            StartSessionRequest,
            EndSessionRequest,
            EndSessionResponse,
            EndedSessionsResponse,
            ExternalVisitRequest,
            // statistics
            BookmarkTimeStats,
            BookmarkUsage,
            UserTimeStats,
            DailyUsage,
            SessionTypeUsage,
            TimeAnalytics,
            StatsResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "TimeTracking", description = "Bookmark time tracking sessions"),
        (name = "Stats", description = "Time spent per bookmark and per user"),
        (name = "System", description = "Service health")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, body = HealthResponse)),
    tag = "System",
    security(())
)]
fn health_doc() {}

#[utoipa::path(
    post,
    path = "/api/time-tracking/session",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Started session, or the one already active", body = TrackingSession),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse),
        (status = 404, description = "Bookmark not found", body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 503, body = ErrorResponse)
    ),
    tag = "TimeTracking"
)]
fn start_session_doc() {}

#[utoipa::path(
    put,
    path = "/api/time-tracking/session",
    request_body = EndSessionRequest,
    responses(
        (status = 200, description = "Ended session or bulk summary", body = EndSessionResponse),
        (status = 404, body = ErrorResponse),
        (status = 503, body = ErrorResponse)
    ),
    tag = "TimeTracking"
)]
fn end_session_doc() {}

#[utoipa::path(
    get,
    path = "/api/time-tracking/session",
    params(ActiveSessionQuery),
    responses(
        (status = 200, description = "Active session with elapsed seconds, or null", body = Option<ActiveSessionResponse>),
        (status = 400, body = ErrorResponse)
    ),
    tag = "TimeTracking"
)]
fn active_session_doc() {}

#[utoipa::path(
    get,
    path = "/api/time-tracking/sessions",
    params(SessionListQuery),
    responses((status = 200, description = "Newest first", body = Vec<TrackingSession>)),
    tag = "TimeTracking"
)]
fn list_sessions_doc() {}

#[utoipa::path(
    get,
    path = "/api/time-tracking/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Bookmark stats, analytics, or user stats", body = StatsResponse),
        (status = 400, body = ErrorResponse)
    ),
    tag = "Stats"
)]
fn stats_doc() {}

#[utoipa::path(
    post,
    path = "/api/time-tracking/external-visit",
    request_body = ExternalVisitRequest,
    responses((status = 200, body = TrackingSession)),
    tag = "TimeTracking"
)]
fn external_visit_doc() {}

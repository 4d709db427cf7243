use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, TrackingError},
    state::AppState,
    types::UserId,
    utils::jwt::verify_access_token,
};

/// Identity resolved from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
}

/// Rejects the request unless it carries a valid bearer token. There is no
/// fallback identity.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(request.headers(), &state.config.jwt_secret)?;
    tracing::debug!(user_id = %user.id, "Authenticated request");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

fn authenticate_request(headers: &HeaderMap, secret: &str) -> Result<CurrentUser, TrackingError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or(TrackingError::AuthenticationFailed)?;

    let claims = verify_access_token(token, secret).map_err(|err| {
        tracing::debug!(error = %err, "Rejected bearer token");
        TrackingError::AuthenticationFailed
    })?;

    let id = UserId::parse(&claims.sub).map_err(|_| TrackingError::AuthenticationFailed)?;
    Ok(CurrentUser { id })
}

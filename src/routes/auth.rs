//! Login Route
//!
//! Exchanges HTTP Basic credentials for a bearer token. The token is
//! returned both as an `auth-token` cookie and a `token` header.

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{AUTHORIZATION, LOCATION, REFERER, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "token";
pub const TOKEN_COOKIE: &str = "auth-token";

/// Create the login router
pub fn router() -> Router<AppState> {
    Router::new().route("/login/", get(login).post(login))
}

/// GET|POST /login/
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|h| state.credentials().verify_basic(h));

    if !authorized {
        tracing::warn!("Login rejected");
        return Err(AppError::Unauthorized);
    }

    let token = state.tokens().issue();
    let referer = headers.get(REFERER).and_then(|v| v.to_str().ok());
    let location = redirect_target(referer, &state.config().server.dev_origin);

    tracing::info!(location = %location, "Login accepted");

    Response::builder()
        .status(StatusCode::FOUND)
        .header(SET_COOKIE, format!("{}={}; Path=/", TOKEN_COOKIE, token))
        .header(TOKEN_HEADER, &token)
        .header(LOCATION, location)
        .body(Body::empty())
        .map_err(|e| AppError::Internal(format!("Failed to build login response: {}", e)))
}

/// The dev client root when the login came from it, otherwise `/`
fn redirect_target(referer: Option<&str>, dev_origin: &str) -> String {
    let dev_root = format!("{}/", dev_origin.trim_end_matches('/'));
    match referer {
        Some(r) if r == dev_root => dev_root,
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_target() {
        let origin = "http://localhost:3000";
        assert_eq!(
            redirect_target(Some("http://localhost:3000/"), origin),
            "http://localhost:3000/"
        );
        assert_eq!(redirect_target(Some("http://localhost:3000/dir"), origin), "/");
        assert_eq!(redirect_target(Some("http://example.com/"), origin), "/");
        assert_eq!(redirect_target(None, origin), "/");
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub use crate::services::auth::AuthUser;

/// Cookie carrying the access token for browser clients.
pub const TOKEN_COOKIE: &str = "ride_token";

/// Token from an `Authorization: Bearer` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, crate::error::AppError> {
    // Try cookie first, then header
    let token = match jar.get(TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => bearer_token(request.headers()).ok_or(crate::error::AppError::Unauthorized)?,
    };

    let auth_user = state.token_verifier.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        crate::error::AppError::from(e)
    })?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

//! Middleware for authentication and security headers
//!
//! Role gates insert the resolved [`Profile`] into request extensions so
//! handlers receive the actor via `Extension<Profile>`.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::handlers::auth::validate_session;
use crate::handlers::AppState;
use crate::models::Profile;

/// Any signed-in actor
pub async fn require_session(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match resolve(&state, request.headers()).await {
        Ok(profile) => {
            let mut request = request;
            request.extensions_mut().insert(profile);
            next.run(request).await
        }
        Err(response) => response,
    }
}

/// Admin or lead admin; others are pointed back at the client portal
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match resolve(&state, request.headers()).await {
        Ok(profile) if profile.role.is_admin() => {
            let mut request = request;
            request.extensions_mut().insert(profile);
            next.run(request).await
        }
        Ok(_) => forbidden("/portal"),
        Err(response) => response,
    }
}

/// Lead admin only
pub async fn require_lead(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match resolve(&state, request.headers()).await {
        Ok(profile) if profile.role.is_lead() => {
            let mut request = request;
            request.extensions_mut().insert(profile);
            next.run(request).await
        }
        Ok(profile) if profile.role.is_admin() => forbidden("/admin"),
        Ok(_) => forbidden("/portal"),
        Err(response) => response,
    }
}

async fn resolve(state: &AppState, headers: &header::HeaderMap) -> Result<Profile, Response> {
    match validate_session(&state.pool, headers).await {
        Some(profile) => Ok(profile),
        None => Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Not authenticated", "redirect": "/auth"})),
        )
            .into_response()),
    }
}

/// 403 carrying the landing page the UI should fall back to, instead of raw
/// error text
fn forbidden(redirect: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({"success": false, "error": "Insufficient role", "redirect": redirect})),
    )
        .into_response()
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}

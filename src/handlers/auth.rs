//! Authentication handlers
//!
//! Password auth with argon2, DB-backed sessions, and the internal-portal
//! access-request flow: signing in against the internal portal without an
//! admin role files exactly one pending admin-access request and rejects
//! the login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::AppState;
use crate::models::*;
use crate::validation::validate_signup;

/// Session cookie name
pub const SESSION_COOKIE: &str = "td_session";

/// Rate limit: max attempts per IP per hour
const MAX_LOGIN_ATTEMPTS: i64 = 10;

/// Rate limit for the public contact endpoint
pub const MAX_CONTACT_ATTEMPTS: i64 = 20;

// =============================================================================
// Signup
// =============================================================================

/// Register a new account.
///
/// Everyone signs up as a client; elevated roles come only from the
/// access-request machinery. The configured owner email is the one
/// exception and is seated as lead admin directly.
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SignupRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers);
    if !check_rate_limit(&state.pool, &client_ip, "signup", MAX_LOGIN_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::<ProfileResponse>::error(
                "Too many attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "signup").await;

    let email = input.email.trim().to_lowercase();
    if let Err(e) = validate_signup(&email, &input.password) {
        return (
            StatusCode::BAD_REQUEST,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Password hashing failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Failed to create account")),
            );
        }
    };

    let role = if email == state.owner_email {
        UserRole::SuperAdmin
    } else {
        UserRole::Client
    };

    let result = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (email, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&input.full_name)
    .bind(role)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(profile) => match create_session(&state, &client_ip, profile.id).await {
            Some(cookie) => (
                StatusCode::CREATED,
                [(header::SET_COOKIE, cookie)],
                Json(ApiResponse::success(ProfileResponse::from(profile))),
            ),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Failed to create session")),
            ),
        },
        Err(e) => {
            if is_unique_violation(&e) {
                return (
                    StatusCode::CONFLICT,
                    [(header::SET_COOKIE, "".to_string())],
                    Json(ApiResponse::error("An account with this email already exists")),
                );
            }
            tracing::error!("Failed to create profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Failed to create account")),
            )
        }
    }
}

// =============================================================================
// Login
// =============================================================================

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers);
    if !check_rate_limit(&state.pool, &client_ip, "login", MAX_LOGIN_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::<ProfileResponse>::error(
                "Too many login attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "login").await;

    let email = input.email.trim().to_lowercase();

    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await;

    let profile = match profile {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => {
            // Don't reveal whether the email exists
            return (
                StatusCode::UNAUTHORIZED,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Invalid email or password. Please try again.")),
            );
        }
    };

    let parsed_hash = match PasswordHash::new(&profile.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for {}", profile.email);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error("Invalid email or password. Please try again.")),
        );
    }

    let portal = input.portal.unwrap_or(PortalKind::Client);

    match portal {
        PortalKind::Internal if !profile.role.is_admin() => {
            // File one pending access request, then turn the login away
            let message = ensure_access_request(&state.pool, &profile).await;
            (
                StatusCode::FORBIDDEN,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error(message)),
            )
        }
        PortalKind::Client if profile.role.is_admin() => (
            StatusCode::FORBIDDEN,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error(
                "You are a registered administrator. Please sign in using the internal portal.",
            )),
        ),
        _ => match create_session(&state, &client_ip, profile.id).await {
            Some(cookie) => {
                tracing::info!(email = %profile.email, role = ?profile.role, "Signed in");
                (
                    StatusCode::OK,
                    [(header::SET_COOKIE, cookie)],
                    Json(ApiResponse::success(ProfileResponse::from(profile))),
                )
            }
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Failed to create session")),
            ),
        },
    }
}

/// Create the pending request if this user has none, and word the rejection
/// after its current state
async fn ensure_access_request(pool: &PgPool, profile: &Profile) -> String {
    let existing = sqlx::query_as::<_, AdminAccessRequest>(
        "SELECT * FROM admin_access_requests WHERE user_id = $1",
    )
    .bind(profile.id)
    .fetch_optional(pool)
    .await
    .ok()
    .flatten();

    match existing {
        Some(request) if request.status == AccessRequestStatus::Denied => {
            "Your admin access request was denied.".to_string()
        }
        Some(_) => {
            "Internal access requires approval. Your request is pending approval.".to_string()
        }
        None => {
            let inserted = sqlx::query(
                "INSERT INTO admin_access_requests (user_id, email) VALUES ($1, $2)",
            )
            .bind(profile.id)
            .bind(&profile.email)
            .execute(pool)
            .await;

            if let Err(e) = inserted {
                tracing::error!("Failed to file access request for {}: {}", profile.email, e);
            } else {
                tracing::info!(email = %profile.email, "Admin access request filed");
            }
            "Internal access requires approval. Your request has been filed and is pending approval."
                .to_string()
        }
    }
}

// =============================================================================
// Logout / current user
// =============================================================================

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_token(&token);
        let _ = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&state.pool)
            .await;
    }

    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(())),
    )
}

pub async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match validate_session(&state.pool, &headers).await {
        Some(profile) => (
            StatusCode::OK,
            Json(ApiResponse::success(ProfileResponse::from(profile))),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Not authenticated")),
        ),
    }
}

// =============================================================================
// Session plumbing
// =============================================================================

/// Resolve the requesting profile from the session cookie
pub async fn validate_session(pool: &PgPool, headers: &HeaderMap) -> Option<Profile> {
    let token = extract_session_token(headers)?;
    let token_hash = hash_token(&token);

    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .ok()??;

    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(pool)
        .await
        .ok()?
}

async fn create_session(state: &AppState, _client_ip: &str, user_id: uuid::Uuid) -> Option<String> {
    let token = generate_session_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours);

    let result = sqlx::query("INSERT INTO sessions (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&state.pool)
        .await;

    if let Err(e) = result {
        tracing::error!("Failed to create session: {}", e);
        return None;
    }

    Some(format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        token,
        state.session_expiry_hours * 3600
    ))
}

pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            return Some(value.to_string());
        }
    }

    None
}

fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

// =============================================================================
// Rate limiting
// =============================================================================

pub fn get_client_ip(headers: &HeaderMap) -> String {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

pub async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str, max: i64) -> bool {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await
    .unwrap_or(0);

    count < max
}

pub async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    let _ = sqlx::query("INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)")
        .bind(ip)
        .bind(endpoint)
        .execute(pool)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_sha256_hex() {
        let h1 = hash_token("abc");
        let h2 = hash_token("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_token("abd"));
    }

    #[test]
    fn session_tokens_are_random_hex() {
        let t1 = generate_session_token();
        let t2 = generate_session_token();
        assert_eq!(t1.len(), 64);
        assert_ne!(t1, t2);
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"hunter2hunter2", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong-password", &parsed)
            .is_err());
    }

    #[test]
    fn extracts_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("theme=dark; {}=tok123; lang=en", SESSION_COOKIE)
                .parse()
                .unwrap(),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(get_client_ip(&headers), "203.0.113.9");
    }
}

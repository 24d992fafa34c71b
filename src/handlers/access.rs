//! Admin roster and access-control handlers
//!
//! Lead-admin operations on people rather than tickets: approving or
//! denying access requests, revoking admin rights, and deleting accounts.
//! The configured system-owner email is untouchable throughout.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::notifications::insert_notification;
use super::AppState;
use crate::models::*;

#[derive(Debug, Deserialize)]
pub struct AccessRequestsQuery {
    pub status: Option<AccessRequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub email: String,
}

// =============================================================================
// Roster
// =============================================================================

/// Current admin roster (visible to every admin, for assignment pickers)
pub async fn list_admins(
    State(state): State<AppState>,
    Extension(_admin): Extension<Profile>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, AdminRosterEntry>(
        r#"
        SELECT LOWER(email) AS email, (role = 'super_admin') AS is_lead, created_at
        FROM profiles
        WHERE role IN ('admin', 'super_admin')
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(admins) => (StatusCode::OK, Json(ApiResponse::success(admins))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// All profiles, for the lead-admin members page
pub async fn list_members(
    State(state): State<AppState>,
    Extension(_lead): Extension<Profile>,
) -> impl IntoResponse {
    let result =
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await;

    match result {
        Ok(profiles) => {
            let members: Vec<ProfileResponse> =
                profiles.into_iter().map(ProfileResponse::from).collect();
            (StatusCode::OK, Json(ApiResponse::success(members)))
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Access requests
// =============================================================================

pub async fn list_access_requests(
    State(state): State<AppState>,
    Extension(_lead): Extension<Profile>,
    Query(query): Query<AccessRequestsQuery>,
) -> impl IntoResponse {
    let status = query.status.unwrap_or(AccessRequestStatus::Pending);

    let result = sqlx::query_as::<_, AdminAccessRequest>(
        "SELECT * FROM admin_access_requests WHERE status = $1 ORDER BY created_at DESC",
    )
    .bind(status)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(requests) => (StatusCode::OK, Json(ApiResponse::success(requests))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Approve a pending request: the requester becomes an admin
pub async fn approve_access_request(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to open transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<AdminAccessRequest>::error("Approval failed")),
            );
        }
    };

    let request = sqlx::query_as::<_, AdminAccessRequest>(
        r#"
        UPDATE admin_access_requests
        SET status = 'approved', decided_at = NOW(), decided_by = $1
        WHERE id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(&lead.email)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await;

    let request = match request {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("No pending request with that id")),
            )
        }
        Err(e) => {
            tracing::error!("Approval failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Approval failed")),
            );
        }
    };

    let promoted = sqlx::query("UPDATE profiles SET role = 'admin' WHERE id = $1 AND role = 'client'")
        .bind(request.user_id)
        .execute(&mut *tx)
        .await;

    if let Err(e) = promoted {
        tracing::error!("Role promotion failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Approval failed")),
        );
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Approval commit failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Approval failed")),
        );
    }

    tracing::info!(lead = %lead.email, email = %request.email, "Admin access approved");

    insert_notification(
        &state,
        request.user_id,
        "Admin access approved".to_string(),
        Some("Sign in through the internal portal to start working cases.".to_string()),
        None,
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::success(request)))
}

/// Deny a pending request: status only, the account stays a client
pub async fn deny_access_request(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, AdminAccessRequest>(
        r#"
        UPDATE admin_access_requests
        SET status = 'denied', decided_at = NOW(), decided_by = $1
        WHERE id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(&lead.email)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(request)) => {
            tracing::info!(lead = %lead.email, email = %request.email, "Admin access denied");

            insert_notification(
                &state,
                request.user_id,
                "Admin access denied".to_string(),
                None,
                None,
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No pending request with that id")),
        ),
        Err(e) => {
            tracing::error!("Denial failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Denial failed")),
            )
        }
    }
}

// =============================================================================
// Revoke / delete
// =============================================================================

/// Demote an admin back to a client account
pub async fn revoke_admin(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Json(input): Json<RevokeRequest>,
) -> impl IntoResponse {
    let target = input.email.trim().to_lowercase();

    if target == state.owner_email {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                "The system owner's access cannot be revoked",
            )),
        );
    }
    if target == lead.email.to_lowercase() {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("You cannot revoke your own access")),
        );
    }

    let result = sqlx::query("UPDATE profiles SET role = 'client' WHERE LOWER(email) = $1 AND role = 'admin'")
        .bind(&target)
        .execute(&state.pool)
        .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => {
            tracing::info!(lead = %lead.email, email = %target, "Admin access revoked");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No admin account with that email")),
        ),
        Err(e) => {
            tracing::error!("Revocation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Revocation failed")),
            )
        }
    }
}

/// Permanently delete an account and everything it owns
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let target = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await;

    let target = match target {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<serde_json::Value>::error("Account not found")),
            )
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if target.email.to_lowercase() == state.owner_email {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("The system owner's account cannot be deleted")),
        );
    }
    if target.id == lead.id {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("You cannot delete your own account")),
        );
    }

    // Stored objects first, best-effort; the row cascade is the real delete
    if let Err(e) = state.store.remove_owner_dir(target.id).await {
        tracing::warn!("Object cleanup for {} failed: {}", target.email, e);
    }

    let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(target.id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(_) => {
            tracing::warn!(lead = %lead.email, email = %target.email, "Account deleted");
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "deleted": true,
                    "email": target.email,
                }))),
            )
        }
        Err(e) => {
            tracing::error!("Account deletion failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Account deletion failed")),
            )
        }
    }
}

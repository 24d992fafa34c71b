//! In-app notification handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::events::{PortalEvent, Topic};
use crate::models::*;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<i64>,
}

/// The caller's notifications, newest first, with the unread count
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Query(query): Query<ListNotificationsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (notifications, unread) = tokio::join!(
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(profile.id)
        .bind(limit)
        .fetch_all(&state.pool),
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(profile.id)
        .fetch_one(&state.pool),
    );

    match notifications {
        Ok(notifications) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "notifications": notifications,
                "unread": unread.unwrap_or(0),
            }))),
        ),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Mark one notification as read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(profile.id)
            .execute(&state.pool)
            .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => (StatusCode::OK, Json(ApiResponse::success(()))),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Notification not found")),
        ),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Mark all of the caller's notifications as read
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
) -> impl IntoResponse {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1")
        .bind(profile.id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::success(()))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Record a notification and push it onto the recipient's event feed.
/// Failures are logged; callers never depend on this succeeding.
pub(crate) async fn insert_notification(
    state: &AppState,
    user_id: Uuid,
    title: String,
    content: Option<String>,
    submission_id: Option<Uuid>,
) {
    let result = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, title, content, submission_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&title)
    .bind(&content)
    .bind(submission_id)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(notification) => {
            state.hub.publish(
                Topic::User(user_id),
                PortalEvent::NotificationCreated { notification },
            );
        }
        Err(e) => {
            tracing::warn!("Failed to record notification '{}': {}", title, e);
        }
    }
}

//! Admin portal handlers
//!
//! Listing/triage views, the status lifecycle, assignment, and the
//! lead-admin full reset.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::notifications::insert_notification;
use super::submissions::get_submission_by_id;
use super::AppState;
use crate::events::{PortalEvent, Topic};
use crate::models::*;
use crate::notify::Outbound;

// =============================================================================
// Query / request parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    /// `all` (default), `assigned`, or a status key like `work_in_progress`
    pub filter: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: SubmissionStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub confirm: String,
}

fn status_from_key(key: &str) -> Option<SubmissionStatus> {
    match key {
        "open" => Some(SubmissionStatus::Open),
        "work_in_progress" => Some(SubmissionStatus::WorkInProgress),
        "pending" => Some(SubmissionStatus::Pending),
        "completed" => Some(SubmissionStatus::Completed),
        "closed" => Some(SubmissionStatus::Closed),
        _ => None,
    }
}

// =============================================================================
// Listing & triage
// =============================================================================

/// All submissions, filtered and searched, most recently updated first
pub async fn list_submissions_admin(
    State(state): State<AppState>,
    Extension(admin): Extension<Profile>,
    Query(query): Query<ListSubmissionsQuery>,
) -> impl IntoResponse {
    let filter = query.filter.as_deref().unwrap_or("all");

    let result = match filter {
        "assigned" => {
            sqlx::query_as::<_, Submission>(
                r#"
                SELECT * FROM submissions
                WHERE LOWER(assigned_to) = LOWER($1)
                ORDER BY updated_at DESC
                "#,
            )
            .bind(&admin.email)
            .fetch_all(&state.pool)
            .await
        }
        "all" => {
            sqlx::query_as::<_, Submission>("SELECT * FROM submissions ORDER BY updated_at DESC")
                .fetch_all(&state.pool)
                .await
        }
        key => match status_from_key(key) {
            Some(status) => {
                sqlx::query_as::<_, Submission>(
                    "SELECT * FROM submissions WHERE status = $1 ORDER BY updated_at DESC",
                )
                .bind(status)
                .fetch_all(&state.pool)
                .await
            }
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<Vec<Submission>>::error(format!(
                        "Unknown filter '{}'",
                        key
                    ))),
                )
            }
        },
    };

    match result {
        Ok(mut submissions) => {
            if let Some(ref search) = query.search {
                let needle = search.trim().to_lowercase();
                if !needle.is_empty() {
                    submissions.retain(|s| matches_search(s, &needle));
                }
            }
            (StatusCode::OK, Json(ApiResponse::success(submissions)))
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

fn matches_search(submission: &Submission, needle: &str) -> bool {
    let hay = |s: &str| s.to_lowercase().contains(needle);
    hay(&submission.request_no)
        || hay(&submission.client_email)
        || submission.client_full_name.as_deref().map_or(false, hay)
        || submission.tax_year.as_deref().map_or(false, hay)
        || submission.assigned_to.as_deref().map_or(false, hay)
        || hay(&submission.service_name)
        || hay(submission.status.title())
}

/// Master queue: unassigned submissions, oldest first (first in, first out)
pub async fn master_queue(
    State(state): State<AppState>,
    Extension(_lead): Extension<Profile>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions WHERE assigned_to IS NULL ORDER BY created_at ASC",
    )
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(submissions) => (StatusCode::OK, Json(ApiResponse::success(submissions))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Most recently updated submissions
pub async fn recent_activity(
    State(state): State<AppState>,
    Extension(_admin): Extension<Profile>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(5).clamp(1, 50);

    let result = sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions ORDER BY updated_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(submissions) => (StatusCode::OK, Json(ApiResponse::success(submissions))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Dashboard counters
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(admin): Extension<Profile>,
) -> impl IntoResponse {
    let by_status = sqlx::query_as::<_, (String, i64)>(
        "SELECT status::text, COUNT(*) FROM submissions GROUP BY status",
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let total: i64 = by_status.iter().map(|(_, n)| n).sum();

    let assigned_to_me: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE LOWER(assigned_to) = LOWER($1)",
    )
    .bind(&admin.email)
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let by_status: std::collections::HashMap<String, i64> = by_status.into_iter().collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "total": total,
            "assigned_to_me": assigned_to_me,
            "by_status": by_status,
        }))),
    )
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Change a submission's status.
///
/// Closed tickets are frozen for non-lead admins; the gate is part of the
/// UPDATE predicate so a concurrent close cannot slip an update through.
/// On success the client is notified by email, in-app, and on the feeds.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(admin): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Submission>(
        r#"
        UPDATE submissions
        SET status = $1, updated_at = NOW(), updated_by = $2
        WHERE id = $3 AND (status <> 'closed' OR $4)
        RETURNING *
        "#,
    )
    .bind(input.status)
    .bind(&admin.email)
    .bind(id)
    .bind(admin.role.is_lead())
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(submission)) => {
            tracing::info!(
                admin = %admin.email,
                request_no = %submission.request_no,
                status = %submission.status,
                "Status updated"
            );

            state.dispatcher.dispatch_detached(Outbound::new(
                &submission.client_email,
                format!("Status Update: Ticket {}", submission.request_no),
                format!(
                    "Your ticket {} status has been updated to: {}.\n\n\
                     Please log in to the portal to view the details.",
                    submission.request_no, submission.status
                ),
            ));

            insert_notification(
                &state,
                submission.user_id,
                format!(
                    "Request {} is now {}",
                    submission.request_no, submission.status
                ),
                None,
                Some(submission.id),
            )
            .await;

            let event = PortalEvent::StatusChanged {
                submission_id: submission.id,
                request_no: submission.request_no.clone(),
                status: submission.status,
            };
            state
                .hub
                .publish(Topic::Submission(submission.id), event.clone());
            state.hub.publish(Topic::User(submission.user_id), event);

            (StatusCode::OK, Json(ApiResponse::success(submission)))
        }
        Ok(None) => match get_submission_by_id(&state.pool, id).await {
            Some(_) => (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error(
                    "Closed tickets can only be updated by a lead admin",
                )),
            ),
            None => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Submission not found")),
            ),
        },
        Err(e) => {
            tracing::error!("Failed to update status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update status")),
            )
        }
    }
}

// =============================================================================
// Assignment
// =============================================================================

/// Assign or reassign a submission to an admin (lead only). The target must
/// be on the current admin roster.
pub async fn assign_submission(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignRequest>,
) -> impl IntoResponse {
    let target = input.email.trim().to_lowercase();

    let is_admin: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE LOWER(email) = $1 AND role IN ('admin', 'super_admin'))",
    )
    .bind(&target)
    .fetch_one(&state.pool)
    .await
    .unwrap_or(false);

    if !is_admin {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Submission>::error(format!(
                "{} is not a current admin",
                target
            ))),
        );
    }

    let result = sqlx::query_as::<_, Submission>(
        r#"
        UPDATE submissions
        SET assigned_to = $1, assigned_by = $2, assigned_at = NOW(),
            updated_at = NOW(), updated_by = $2
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(&target)
    .bind(&lead.email)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(submission)) => {
            tracing::info!(
                lead = %lead.email,
                request_no = %submission.request_no,
                assigned_to = %target,
                "Case reassigned"
            );
            (StatusCode::OK, Json(ApiResponse::success(submission)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Submission not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to assign submission: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to assign submission")),
            )
        }
    }
}

// =============================================================================
// Full reset
// =============================================================================

/// Delete every submission, file, and message, and restart the request
/// number sequence at 1. Irreversible; demands the exact confirm phrase.
pub async fn reset_all(
    State(state): State<AppState>,
    Extension(lead): Extension<Profile>,
    Json(input): Json<ResetRequest>,
) -> impl IntoResponse {
    if input.confirm != "RESET" {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<serde_json::Value>::error(
                "Confirmation phrase mismatch; send {\"confirm\": \"RESET\"}",
            )),
        );
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to open transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Reset failed")),
            );
        }
    };

    // Cascades remove files, messages, and submission-linked notifications
    let deleted = match sqlx::query("DELETE FROM submissions").execute(&mut *tx).await {
        Ok(r) => r.rows_affected(),
        Err(e) => {
            tracing::error!("Reset delete failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Reset failed")),
            );
        }
    };

    if let Err(e) = sqlx::query("ALTER SEQUENCE request_no_seq RESTART WITH 1")
        .execute(&mut *tx)
        .await
    {
        tracing::error!("Sequence restart failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Reset failed")),
        );
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Reset commit failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Reset failed")),
        );
    }

    // Rows are gone; stored objects are best-effort cleanup
    if let Err(e) = state.store.clear_all().await {
        tracing::warn!("Object store cleanup after reset failed: {}", e);
    }

    tracing::warn!(lead = %lead.email, deleted, "Full data reset performed");

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "deleted_submissions": deleted,
            "sequence_restarted": true,
        }))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn status_keys_round_trip() {
        assert_eq!(status_from_key("open"), Some(SubmissionStatus::Open));
        assert_eq!(
            status_from_key("work_in_progress"),
            Some(SubmissionStatus::WorkInProgress)
        );
        assert_eq!(status_from_key("closed"), Some(SubmissionStatus::Closed));
        assert_eq!(status_from_key("Open"), None);
        assert_eq!(status_from_key("inbox"), None);
    }

    fn submission() -> Submission {
        Submission {
            id: Uuid::new_v4(),
            request_no: "REQ-0042".to_string(),
            user_id: Uuid::new_v4(),
            client_email: "jane@example.com".to_string(),
            client_full_name: Some("Jane Doe".to_string()),
            client_phone: Some("+1-5551234567".to_string()),
            service_key: "individual_1040".to_string(),
            service_name: "Individual Tax Filing (Form 1040)".to_string(),
            tax_year: Some("2025".to_string()),
            notes: None,
            status: SubmissionStatus::Open,
            assigned_to: Some("agent@taxdesk.tax".to_string()),
            assigned_by: None,
            assigned_at: None,
            deadline_date: None,
            required_docs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    #[test]
    fn search_matches_across_fields() {
        let sub = submission();
        assert!(matches_search(&sub, "req-0042"));
        assert!(matches_search(&sub, "jane"));
        assert!(matches_search(&sub, "1040"));
        assert!(matches_search(&sub, "agent@"));
        assert!(matches_search(&sub, "open"));
        assert!(!matches_search(&sub, "fbar"));
    }
}

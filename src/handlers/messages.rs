//! Timeline message handlers
//!
//! Append-only thread per submission. Posting notifies the counterparty by
//! email (client → admin alias, admin → the client), and admin posts also
//! leave an in-app notification for the owner. The inserted row is the
//! primary step; notifications are detached.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::notifications::insert_notification;
use super::submissions::load_visible_submission;
use super::AppState;
use crate::events::{PortalEvent, Topic};
use crate::models::*;
use crate::notify::Outbound;
use crate::validation::validate_message_body;

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<PostMessageRequest>,
) -> impl IntoResponse {
    // Whitespace-only bodies are a no-op: no row, no notification
    if let Err(e) = validate_message_body(&input.body) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<SubmissionMessage>::error(e.to_string())),
        );
    }

    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Submission not found")),
            )
        }
    };

    let sender = if profile.role.is_admin() {
        SenderRole::Admin
    } else {
        SenderRole::Client
    };

    let result = sqlx::query_as::<_, SubmissionMessage>(
        r#"
        INSERT INTO submission_messages (submission_id, sender, body)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(submission.id)
    .bind(sender)
    .bind(input.body.trim())
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(message) => {
            let _ = sqlx::query(
                "UPDATE submissions SET updated_at = NOW(), updated_by = $1 WHERE id = $2",
            )
            .bind(&profile.email)
            .bind(submission.id)
            .execute(&state.pool)
            .await;

            // Every open viewer of this submission gets the insert,
            // including the poster; there is no dedup key
            state.hub.publish(
                Topic::Submission(submission.id),
                PortalEvent::MessagePosted {
                    message: message.clone(),
                },
            );

            match sender {
                SenderRole::Client => {
                    if let Some(ref admin_email) = state.notify.admin_email {
                        state.dispatcher.dispatch_detached(Outbound::new(
                            admin_email,
                            format!("New Comment: {}", submission.request_no),
                            format!(
                                "Client {} commented on request {}:\n\n\"{}\"",
                                submission.client_email,
                                submission.request_no,
                                message.body
                            ),
                        ));
                    }
                }
                SenderRole::Admin => {
                    state.dispatcher.dispatch_detached(Outbound::new(
                        &submission.client_email,
                        format!("New Message: Ticket {}", submission.request_no),
                        format!(
                            "Dear Client,\n\nWe have posted a new comment on your request #{}.\n\n\
                             Message:\n\"{}\"\n\nPlease log in to your portal to review the full \
                             details and provide a response if necessary.",
                            submission.request_no, message.body
                        ),
                    ));

                    insert_notification(
                        &state,
                        submission.user_id,
                        format!("New message on {}", submission.request_no),
                        Some(message.body.clone()),
                        Some(submission.id),
                    )
                    .await;
                }
            }

            (StatusCode::CREATED, Json(ApiResponse::success(message)))
        }
        Err(e) => {
            tracing::error!("Failed to post message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to post message")),
            )
        }
    }
}

/// Timeline in creation order
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Vec<SubmissionMessage>>::error(
                    "Submission not found",
                )),
            )
        }
    };

    let result = sqlx::query_as::<_, SubmissionMessage>(
        "SELECT * FROM submission_messages WHERE submission_id = $1 ORDER BY created_at ASC",
    )
    .bind(submission.id)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(messages) => (StatusCode::OK, Json(ApiResponse::success(messages))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

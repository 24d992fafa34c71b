//! Submission handlers for the client portal

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::AppState;
use crate::models::*;
use crate::notify::Outbound;
use crate::services::get_service_by_key;
use crate::validation::validate_create_submission;

// =============================================================================
// Create
// =============================================================================

/// Create a new service request.
///
/// Snapshots the service's required-document checklist onto the record and
/// fires two detached notifications: an acknowledgement to the client and a
/// "new request" broadcast to the admin alias. Both are best-effort; the
/// created submission is the primary step.
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Json(input): Json<CreateSubmission>,
) -> impl IntoResponse {
    if let Err(e) = validate_create_submission(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Submission>::error(e.to_string())),
        );
    }

    // Lookup is infallible after validation
    let service = match get_service_by_key(&input.service_key) {
        Some(s) => s,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("Unknown service")),
            )
        }
    };

    let phone = format!("{}-{}", input.country_code.trim(), input.phone.trim());

    let result = sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (
            user_id, client_email, client_full_name, client_phone,
            service_key, service_name, tax_year, notes,
            deadline_date, required_docs, updated_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $2)
        RETURNING *
        "#,
    )
    .bind(profile.id)
    .bind(&profile.email)
    .bind(input.full_name.trim())
    .bind(&phone)
    .bind(service.key)
    .bind(service.name)
    .bind(&input.tax_year)
    .bind(&input.notes)
    .bind(input.deadline_date)
    .bind(service.required_doc_keys())
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(submission) => {
            tracing::info!(
                request_no = %submission.request_no,
                client = %submission.client_email,
                service = %submission.service_key,
                "Submission created"
            );

            let client_name = submission
                .client_full_name
                .clone()
                .unwrap_or_else(|| "Client".to_string());

            state.dispatcher.dispatch_detached(Outbound::new(
                &submission.client_email,
                format!("Request Received: {}", submission.request_no),
                format!(
                    "Dear {},\n\nWe have received your new request ({}) for {}.\n\n\
                     A member of our team has been notified and will review your details shortly.\n\n\
                     You can track the status and upload documents via the portal.",
                    client_name, submission.request_no, submission.service_name
                ),
            ));

            if let Some(ref admin_email) = state.notify.admin_email {
                state.dispatcher.dispatch_detached(Outbound::new(
                    admin_email,
                    format!("New Request: {}", submission.request_no),
                    format!(
                        "A new request has been created by {}.\n\nService: {}\nRequest No: {}\n\n\
                         Please log in to the admin panel to review and assign this case.",
                        submission.client_email, submission.service_name, submission.request_no
                    ),
                ));
            } else {
                tracing::warn!("EMAIL_TO not configured; admin broadcast skipped");
            }

            (StatusCode::CREATED, Json(ApiResponse::success(submission)))
        }
        Err(e) => {
            tracing::error!("Failed to create submission: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create request")),
            )
        }
    }
}

// =============================================================================
// Read
// =============================================================================

/// List the caller's own submissions, most recently updated first
pub async fn list_my_submissions(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(profile.id)
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

/// Submission detail with files, timeline, and the checklist gap
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<SubmissionDetailResponse>::error(
                    "Submission not found",
                )),
            )
        }
    };

    // Two independent queries, issued together
    let (files, messages) = tokio::join!(
        sqlx::query_as::<_, SubmissionFile>(
            "SELECT * FROM submission_files WHERE submission_id = $1 ORDER BY created_at",
        )
        .bind(submission.id)
        .fetch_all(&state.pool),
        sqlx::query_as::<_, SubmissionMessage>(
            "SELECT * FROM submission_messages WHERE submission_id = $1 ORDER BY created_at ASC",
        )
        .bind(submission.id)
        .fetch_all(&state.pool),
    );

    let files = files.unwrap_or_default();
    let messages = messages.unwrap_or_default();
    let missing_docs = missing_doc_keys(&submission.required_docs, &files);

    let response = SubmissionDetailResponse {
        submission,
        files: files.into_iter().map(FileResponse::from).collect(),
        messages,
        missing_docs,
    };

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

// =============================================================================
// Shared helpers
// =============================================================================

pub(crate) async fn get_submission_by_id(pool: &PgPool, id: Uuid) -> Option<Submission> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
}

/// Owners see their own tickets; admins see all of them
pub(crate) fn can_view(profile: &Profile, submission: &Submission) -> bool {
    profile.role.is_admin() || submission.user_id == profile.id
}

/// Fetch a submission the caller is allowed to see. Rows outside the
/// caller's visibility read as absent, not forbidden.
pub(crate) async fn load_visible_submission(
    pool: &PgPool,
    id: Uuid,
    profile: &Profile,
) -> Option<Submission> {
    let submission = get_submission_by_id(pool, id).await?;
    if can_view(profile, &submission) {
        Some(submission)
    } else {
        None
    }
}

//! Document attachment handlers
//!
//! Uploads are a two-phase operation: the object is written first, then the
//! metadata row. The row is the source of truth; when the insert fails the
//! just-written object is removed best-effort, and the orphan path is
//! logged as the reconciliation record if removal fails too.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use std::io::{Cursor, Write};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::ZipWriter;

use super::submissions::load_visible_submission;
use super::AppState;
use crate::models::*;
use crate::storage::DocumentStore;
use crate::validation::{validate_doc_key, validate_file_upload, validate_filename_extensions};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub doc_key: String,
}

// =============================================================================
// Upload
// =============================================================================

pub async fn upload_document(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<FileResponse>::error("Submission not found")),
            )
        }
    };

    if let Err(e) = validate_doc_key(
        &query.doc_key,
        &submission.required_docs,
        profile.role.is_admin(),
    ) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("No file provided")),
            );
        }
        Err(e) => {
            tracing::error!("Multipart parsing error: {}", e);
            let error_msg = if e.to_string().contains("length limit") {
                "File too large."
            } else {
                "Failed to process upload. Please try again."
            };
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(error_msg)),
            );
        }
    };

    let original_filename = field.file_name().unwrap_or("unknown").to_string();
    let declared_type = field.content_type().map(|s| s.to_string());

    let data = match field.bytes().await {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Failed to read file bytes: {}", e);
            let error_msg = if e.to_string().contains("length limit") {
                "File too large."
            } else {
                "Failed to read uploaded file. Please try again."
            };
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(error_msg)),
            );
        }
    };

    // Fall back to magic-byte sniffing when the browser sent nothing useful
    let content_type = match declared_type {
        Some(t) if t != "application/octet-stream" => t,
        _ => infer::get(&data)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };

    if let Err(e) = validate_file_upload(&content_type, data.len(), state.max_upload_size) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    if let Err(e) = validate_filename_extensions(&original_filename) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    // Phase 1: store the object
    let storage_path = DocumentStore::build_storage_path(
        submission.user_id,
        submission.id,
        &query.doc_key,
        &original_filename,
    );

    if let Err(e) = state.store.put(&storage_path, &data).await {
        tracing::error!("Failed to store object {}: {}", storage_path, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to store file. Please try again.")),
        );
    }

    // Phase 2: metadata row (the source of truth)
    let result = sqlx::query_as::<_, SubmissionFile>(
        r#"
        INSERT INTO submission_files (
            submission_id, doc_key, file_name, storage_path, mime_type, size_bytes, uploaded_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(submission.id)
    .bind(&query.doc_key)
    .bind(&original_filename)
    .bind(&storage_path)
    .bind(&content_type)
    .bind(data.len() as i64)
    .bind(profile.id)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(file) => {
            tracing::info!(
                request_no = %submission.request_no,
                doc_key = %file.doc_key,
                size = file.size_bytes,
                "Document uploaded"
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(FileResponse::from(file))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to store file metadata: {}", e);
            if let Err(cleanup_err) = state.store.remove(&storage_path).await {
                tracing::warn!(
                    "Orphaned object pending reconciliation at {}: {}",
                    storage_path,
                    cleanup_err
                );
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to store file. Please try again.")),
            )
        }
    }
}

// =============================================================================
// List / delete
// =============================================================================

/// All attachments plus the checklist snapshot and its gap
pub async fn list_files(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<serde_json::Value>::error(
                    "Submission not found",
                )),
            )
        }
    };

    let files = sqlx::query_as::<_, SubmissionFile>(
        "SELECT * FROM submission_files WHERE submission_id = $1 ORDER BY created_at",
    )
    .bind(submission.id)
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let missing = missing_doc_keys(&submission.required_docs, &files);
    let files: Vec<FileResponse> = files.into_iter().map(FileResponse::from).collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "files": files,
            "required_docs": submission.required_docs,
            "missing_docs": missing,
        }))),
    )
}

/// Delete an attachment. Object removal is best-effort; the metadata row is
/// removed regardless, so the file disappears from listings either way.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Submission not found")),
            )
        }
    };

    let file = sqlx::query_as::<_, SubmissionFile>(
        "SELECT * FROM submission_files WHERE id = $1 AND submission_id = $2",
    )
    .bind(file_id)
    .bind(submission.id)
    .fetch_optional(&state.pool)
    .await;

    match file {
        Ok(Some(file)) => {
            if let Err(e) = state.store.remove(&file.storage_path).await {
                tracing::warn!("Object delete failed for {}: {}", file.storage_path, e);
            }

            let _ = sqlx::query("DELETE FROM submission_files WHERE id = $1")
                .bind(file_id)
                .execute(&state.pool)
                .await;

            tracing::info!(
                request_no = %submission.request_no,
                doc_key = %file.doc_key,
                "Document removed"
            );

            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("File not found")),
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

// =============================================================================
// Download
// =============================================================================

pub async fn download_file(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => return not_found_json("Submission not found"),
    };

    let file = sqlx::query_as::<_, SubmissionFile>(
        "SELECT * FROM submission_files WHERE id = $1 AND submission_id = $2",
    )
    .bind(file_id)
    .bind(submission.id)
    .fetch_optional(&state.pool)
    .await
    .ok()
    .flatten();

    let file = match file {
        Some(f) => f,
        None => return not_found_json("File not found"),
    };

    match state.store.get(&file.storage_path).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, file.mime_type)
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            )
            .body(Body::from(bytes))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            tracing::error!("Object read failed for {}: {}", file.storage_path, e);
            not_found_json("Stored object is missing")
        }
    }
}

/// Bundle every attachment into one ZIP, reading objects sequentially
pub async fn download_archive(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> Response {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => return not_found_json("Submission not found"),
    };

    let files = sqlx::query_as::<_, SubmissionFile>(
        "SELECT * FROM submission_files WHERE submission_id = $1 ORDER BY created_at",
    )
    .bind(submission.id)
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let mut zip_buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut zip_buffer);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for file in &files {
            match state.store.get(&file.storage_path).await {
                Ok(bytes) => {
                    let entry_name = format!("{}/{}", file.doc_key, file.file_name);
                    if zip.start_file(entry_name, options).is_ok() {
                        let _ = zip.write_all(&bytes);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping missing object {}: {}", file.storage_path, e);
                }
            }
        }

        let _ = zip.finish();
    }

    tracing::info!(
        request_no = %submission.request_no,
        files = files.len(),
        "Archive downloaded"
    );

    let zip_data = zip_buffer.into_inner();
    let filename = format!("{}_documents.zip", submission.request_no);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(zip_data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn not_found_json(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}

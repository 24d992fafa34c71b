//! Data models for the application

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Admin,
    SuperAdmin,
}

impl UserRole {
    /// Admin or lead admin
    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }

    /// Lead admin only
    pub fn is_lead(self) -> bool {
        self == UserRole::SuperAdmin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Open,
    WorkInProgress,
    Pending,
    Completed,
    Closed,
}

impl SubmissionStatus {
    /// Human-readable form used in emails and notification titles
    pub fn title(self) -> &'static str {
        match self {
            SubmissionStatus::Open => "Open",
            SubmissionStatus::WorkInProgress => "Work in Progress",
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Completed => "Completed",
            SubmissionStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Whether `actor` may change the status of a ticket currently in `current`.
///
/// Closed tickets are frozen for everyone except a lead admin, who may move
/// them back to any status.
pub fn may_update_status(current: SubmissionStatus, actor: UserRole) -> bool {
    current != SubmissionStatus::Closed || actor.is_lead()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sender_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Client,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Denied,
}

/// Which portal a sign-in targets. Picking `internal` without an admin role
/// drives the access-request state machine instead of granting entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalKind {
    Client,
    Internal,
}

// =============================================================================
// Profile & Session
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            role: p.role,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Defaults to the client portal when absent
    pub portal: Option<PortalKind>,
}

// =============================================================================
// Submission
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub request_no: String,
    pub user_id: Uuid,
    pub client_email: String,
    pub client_full_name: Option<String>,
    pub client_phone: Option<String>,
    pub service_key: String,
    pub service_name: String,
    pub tax_year: Option<String>,
    pub notes: Option<String>,
    pub status: SubmissionStatus,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub deadline_date: Option<NaiveDate>,
    pub required_docs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmission {
    pub service_key: String,
    pub full_name: String,
    pub country_code: String,
    pub phone: String,
    pub tax_year: Option<String>,
    pub notes: Option<String>,
    pub deadline_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetailResponse {
    #[serde(flatten)]
    pub submission: Submission,
    pub files: Vec<FileResponse>,
    pub messages: Vec<SubmissionMessage>,
    pub missing_docs: Vec<String>,
}

// =============================================================================
// Attached documents
// =============================================================================

/// Checklist key used for admin-supplied files outside the service checklist
pub const ADMIN_UPLOAD_KEY: &str = "ADMIN_UPLOAD";

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct SubmissionFile {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub doc_key: String,
    pub file_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub doc_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionFile> for FileResponse {
    fn from(f: SubmissionFile) -> Self {
        Self {
            id: f.id,
            doc_key: f.doc_key,
            file_name: f.file_name,
            mime_type: f.mime_type,
            size_bytes: f.size_bytes,
            created_at: f.created_at,
        }
    }
}

/// Checklist keys from the creation-time snapshot that have no uploaded file
pub fn missing_doc_keys(required_docs: &[String], files: &[SubmissionFile]) -> Vec<String> {
    required_docs
        .iter()
        .filter(|key| !files.iter().any(|f| &f.doc_key == *key))
        .cloned()
        .collect()
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubmissionMessage {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub sender: SenderRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Admin access requests
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminAccessRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub status: AccessRequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminRosterEntry {
    pub email: String,
    pub is_lead: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// In-app notifications
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub submission_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// API responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_titles() {
        assert_eq!(SubmissionStatus::Open.title(), "Open");
        assert_eq!(SubmissionStatus::WorkInProgress.title(), "Work in Progress");
        assert_eq!(SubmissionStatus::Closed.to_string(), "Closed");
    }

    #[test]
    fn closed_tickets_frozen_for_non_leads() {
        assert!(!may_update_status(SubmissionStatus::Closed, UserRole::Admin));
        assert!(!may_update_status(SubmissionStatus::Closed, UserRole::Client));
        assert!(may_update_status(
            SubmissionStatus::Closed,
            UserRole::SuperAdmin
        ));
    }

    #[test]
    fn open_tickets_updatable_by_admins() {
        assert!(may_update_status(SubmissionStatus::Open, UserRole::Admin));
        assert!(may_update_status(
            SubmissionStatus::Pending,
            UserRole::SuperAdmin
        ));
    }

    #[test]
    fn role_checks() {
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::SuperAdmin.is_admin());
        assert!(!UserRole::Client.is_admin());
        assert!(UserRole::SuperAdmin.is_lead());
        assert!(!UserRole::Admin.is_lead());
    }

    fn file(doc_key: &str) -> SubmissionFile {
        SubmissionFile {
            id: Uuid::new_v4(),
            submission_id: Uuid::new_v4(),
            doc_key: doc_key.to_string(),
            file_name: "f.pdf".to_string(),
            storage_path: "p".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1,
            uploaded_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_docs_cross_reference() {
        let required = vec!["identity".to_string(), "w2".to_string()];
        let files = vec![file("w2"), file(ADMIN_UPLOAD_KEY)];
        assert_eq!(missing_doc_keys(&required, &files), vec!["identity"]);
    }

    #[test]
    fn missing_docs_empty_when_all_uploaded() {
        let required = vec!["identity".to_string()];
        let files = vec![file("identity"), file("identity")];
        assert!(missing_doc_keys(&required, &files).is_empty());
    }
}

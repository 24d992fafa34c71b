//! Input validation module

use crate::models::{CreateSubmission, ADMIN_UPLOAD_KEY};
use crate::services::get_service_by_key;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least 8 characters")]
    WeakPassword,

    #[error("Unknown service '{key}'")]
    UnknownService { key: String },

    #[error("Document key '{key}' is not on this submission's checklist")]
    UnknownDocKey { key: String },

    #[error("Message body cannot be empty")]
    EmptyMessage,

    #[error("Invalid file type: {mime_type}")]
    InvalidFileType { mime_type: String },

    #[error("File too large (max {max_mb} MB)")]
    FileTooLarge { max_mb: usize },
}

/// Validate a new service request
pub fn validate_create_submission(input: &CreateSubmission) -> Result<(), ValidationError> {
    if get_service_by_key(&input.service_key).is_none() {
        return Err(ValidationError::UnknownService {
            key: input.service_key.clone(),
        });
    }

    if input.full_name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "full_name".to_string(),
        });
    }
    if input.full_name.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "full_name".to_string(),
            max: 255,
        });
    }

    if input.country_code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "country_code".to_string(),
        });
    }
    if input.phone.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }
    if input.phone.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: 32,
        });
    }

    if let Some(ref notes) = input.notes {
        if notes.len() > 4000 {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: 4000,
            });
        }
    }

    Ok(())
}

/// Validate signup credentials
pub fn validate_signup(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.len() < 8 {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

/// Validate a timeline message body. Whitespace-only bodies are a no-op
/// upstream: no row, no notification.
pub fn validate_message_body(body: &str) -> Result<(), ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if body.len() > 8000 {
        return Err(ValidationError::TooLong {
            field: "body".to_string(),
            max: 8000,
        });
    }
    Ok(())
}

/// Validate a doc key against a submission's checklist snapshot.
/// Admins may additionally file uploads under the shared-upload key.
pub fn validate_doc_key(
    doc_key: &str,
    required_docs: &[String],
    is_admin: bool,
) -> Result<(), ValidationError> {
    if is_admin && doc_key == ADMIN_UPLOAD_KEY {
        return Ok(());
    }
    if required_docs.iter().any(|k| k == doc_key) {
        return Ok(());
    }
    Err(ValidationError::UnknownDocKey {
        key: doc_key.to_string(),
    })
}

/// Validate an uploaded document
pub fn validate_file_upload(
    mime_type: &str,
    file_size: usize,
    max_size_bytes: usize,
) -> Result<(), ValidationError> {
    if file_size > max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }

    // Identity documents and statements arrive as scans or PDFs; office
    // formats are accepted for books/financials. No HTML/XML (stored-XSS).
    let allowed = mime_type.starts_with("image/")
        || matches!(
            mime_type,
            "application/pdf"
                | "application/msword"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "application/vnd.ms-excel"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "text/plain"
                | "text/csv"
        );

    if !allowed {
        return Err(ValidationError::InvalidFileType {
            mime_type: mime_type.to_string(),
        });
    }

    Ok(())
}

/// Dangerous file extensions that could be executed if misconfigured
const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".php", ".phtml", ".asp", ".aspx", ".jsp", ".cgi", ".pl", ".py", ".rb", ".exe", ".bat",
    ".cmd", ".com", ".msi", ".dll", ".sh", ".bash", ".js", ".jsx", ".ts", ".tsx", ".mjs",
    ".htaccess", ".jar", ".war", ".class",
];

/// Check filename for dangerous extensions, including double extensions
/// like "scan.php.pdf"
pub fn validate_filename_extensions(filename: &str) -> Result<(), ValidationError> {
    let lower = filename.to_lowercase();

    for ext in DANGEROUS_EXTENSIONS {
        if lower.ends_with(ext) {
            return Err(ValidationError::InvalidFileType {
                mime_type: format!("filename contains dangerous extension: {}", ext),
            });
        }
        let double_ext_pattern = format!("{}.", ext);
        if lower.contains(&double_ext_pattern) {
            return Err(ValidationError::InvalidFileType {
                mime_type: format!("filename contains dangerous extension: {}", ext),
            });
        }
    }

    Ok(())
}

/// Simple email validation
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateSubmission {
        CreateSubmission {
            service_key: "individual_1040".to_string(),
            full_name: "Jane Doe".to_string(),
            country_code: "+1".to_string(),
            phone: "5551234567".to_string(),
            tax_year: Some("2025".to_string()),
            notes: None,
            deadline_date: None,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.nl"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@domain.com"));
        assert!(!is_valid_email("user@"));
    }

    #[test]
    fn test_validate_create_submission_valid() {
        assert!(validate_create_submission(&create_input()).is_ok());
    }

    #[test]
    fn test_validate_create_submission_unknown_service() {
        let mut input = create_input();
        input.service_key = "day_trading".to_string();
        assert!(matches!(
            validate_create_submission(&input),
            Err(ValidationError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_validate_create_submission_empty_name() {
        let mut input = create_input();
        input.full_name = "   ".to_string();
        assert!(matches!(
            validate_create_submission(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_create_submission_missing_phone() {
        let mut input = create_input();
        input.phone = "".to_string();
        assert!(matches!(
            validate_create_submission(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_create_submission_missing_country_code() {
        let mut input = create_input();
        input.country_code = " ".to_string();
        assert!(matches!(
            validate_create_submission(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_signup() {
        assert!(validate_signup("jane@example.com", "correcthorse").is_ok());
        assert!(matches!(
            validate_signup("jane@example.com", "short"),
            Err(ValidationError::WeakPassword)
        ));
        assert!(matches!(
            validate_signup("not-an-email", "correcthorse"),
            Err(ValidationError::InvalidEmail)
        ));
    }

    #[test]
    fn test_validate_message_body() {
        assert!(validate_message_body("Hello there").is_ok());
        assert!(matches!(
            validate_message_body("   \n\t "),
            Err(ValidationError::EmptyMessage)
        ));
    }

    #[test]
    fn test_validate_doc_key() {
        let required = vec!["identity".to_string(), "w2".to_string()];
        assert!(validate_doc_key("w2", &required, false).is_ok());
        assert!(validate_doc_key(ADMIN_UPLOAD_KEY, &required, true).is_ok());
        assert!(matches!(
            validate_doc_key(ADMIN_UPLOAD_KEY, &required, false),
            Err(ValidationError::UnknownDocKey { .. })
        ));
        assert!(matches!(
            validate_doc_key("passport", &required, false),
            Err(ValidationError::UnknownDocKey { .. })
        ));
    }

    #[test]
    fn test_validate_file_upload_valid() {
        assert!(validate_file_upload("application/pdf", 1024, 25 * 1024 * 1024).is_ok());
        assert!(validate_file_upload("image/jpeg", 1024, 25 * 1024 * 1024).is_ok());
    }

    #[test]
    fn test_validate_file_upload_too_large() {
        assert!(matches!(
            validate_file_upload("application/pdf", 50 * 1024 * 1024, 25 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_file_upload_invalid_type() {
        assert!(matches!(
            validate_file_upload("text/html", 1024, 25 * 1024 * 1024),
            Err(ValidationError::InvalidFileType { .. })
        ));
    }

    #[test]
    fn test_validate_filename_extensions() {
        assert!(validate_filename_extensions("w2-2025.pdf").is_ok());
        assert!(validate_filename_extensions("passport.jpg").is_ok());
        assert!(validate_filename_extensions("script.php").is_err());
        assert!(validate_filename_extensions("scan.php.pdf").is_err());
        assert!(validate_filename_extensions("SHELL.SH").is_err());
    }
}

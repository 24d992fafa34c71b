//! Public notification endpoints
//!
//! The contact form and the generic notify endpoint, both backed by the one
//! dispatcher. Validation failures never reach the transport;
//! missing transport configuration fails closed naming the settings.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::auth::{check_rate_limit, get_client_ip, record_attempt, MAX_CONTACT_ATTEMPTS};
use super::AppState;
use crate::models::ApiResponse;
use crate::notify::{classify_send_error, Outbound};
use std::time::Duration;

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    /// Older form markup posts `subject`, newer posts `inquiry_type`
    pub subject: Option<String>,
    pub inquiry_type: Option<String>,
    #[validate(length(max = 8000))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// =============================================================================
// Contact form
// =============================================================================

/// Reachability probe for the contact endpoint
pub async fn contact_health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true, "message": "Contact API reachable" }))
}

/// Handle a contact-form submission.
///
/// The email to the admin alias is the primary step; the submitter
/// acknowledgement (when enabled) is secondary and best-effort.
pub async fn submit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ContactRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers);
    if !check_rate_limit(&state.pool, &client_ip, "contact", MAX_CONTACT_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(
                "Too many messages. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "contact").await;

    let name = input.name.trim();
    let email = input.email.trim();
    let message = input.message.trim();

    if name.is_empty() || email.is_empty() || message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Name, email, and message are required")),
        );
    }
    if let Err(e) = input.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid input: {}", e))),
        );
    }

    let missing = state.notify.missing_for_contact();
    if !missing.is_empty() {
        tracing::error!("Contact email not configured; missing {:?}", missing);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Email service not configured. Set {}.",
                missing.join(", ")
            ))),
        );
    }
    let admin_email = state.notify.admin_email.clone().unwrap_or_default();

    let mut body = message.to_string();
    if let Some(phone) = input.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        body.push_str(&format!("\n\nPhone: {}", phone));
    }
    if let Some(inquiry) = input
        .inquiry_type
        .as_deref()
        .or(input.subject.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        body.push_str(&format!("\nInquiry: {}", inquiry));
    }

    let mail = Outbound::new(&admin_email, format!("New contact from {}", name), body)
        .with_reply_to(email);

    let timeout = Duration::from_secs(state.notify.contact_timeout_secs);
    if let Err(e) = state.dispatcher.send_with_timeout(mail, timeout).await {
        tracing::error!("Contact email failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(classify_send_error(&e))),
        );
    }

    // Acknowledgement to the submitter is a named option, not a code path
    if state.notify.send_ack {
        let first_name = name.split_whitespace().next().unwrap_or(name);
        state.dispatcher.dispatch_detached(Outbound::new(
            email,
            "Thank you for contacting TaxDesk",
            format!(
                "Dear {},\n\nWe have received your message and will get back to you within \
                 1-2 business days.\n\nBest regards,\nTaxDesk Tax Advisors",
                first_name
            ),
        ));
    }

    tracing::info!(from = %email, "Contact form delivered");
    (StatusCode::OK, Json(ApiResponse::success(())))
}

// =============================================================================
// Generic notify endpoint
// =============================================================================

/// Send a transactional notification. Requires the full SMTP configuration,
/// else fails closed with a configuration error.
pub async fn notify_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NotifyRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers);
    if !check_rate_limit(&state.pool, &client_ip, "notify", MAX_CONTACT_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error("Too many requests. Please try again later.")),
        );
    }
    record_attempt(&state.pool, &client_ip, "notify").await;

    if input.to.trim().is_empty() || input.subject.trim().is_empty() || input.body.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Missing required fields")),
        );
    }

    let missing = state.notify.missing_for_notify();
    if !missing.is_empty() {
        tracing::error!("Notify email not configured; missing {:?}", missing);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Email service not configured. Set {}.",
                missing.join(", ")
            ))),
        );
    }

    let mail = Outbound::new(input.to.trim(), input.subject.trim(), input.body.trim());

    match state.dispatcher.send(mail).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))),
        Err(e) => {
            tracing::error!("Notify send failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(classify_send_error(&e))),
            )
        }
    }
}

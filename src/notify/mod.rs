//! Notification dispatcher
//!
//! One component owns every outbound email: lifecycle side-effects
//! (request received, status changed, new comment) and the public
//! notify/contact endpoints. Callers hand it a recipient, a subject, and a
//! plain-text body; the dispatcher composes the branded HTML alternative,
//! races the send against a timeout, and classifies transport failures into
//! user-readable categories.
//!
//! Lifecycle side-effects go through [`Dispatcher::dispatch_detached`]:
//! at-most-one attempt, failures logged and never surfaced to the action
//! that triggered them.

pub mod console;
pub mod smtp;
pub mod template;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// An email ready to be sent
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: String,
    pub subject: String,
    /// Plain-text body; the HTML alternative is derived from it
    pub body: String,
    pub reply_to: Option<String>,
}

impl Outbound {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Email send failed: {0}")]
    Transport(String),
    #[error("Email send timed out after {0} seconds")]
    Timeout(u64),
}

/// Email transport
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Outbound) -> Result<(), NotifyError>;
}

/// The one dispatcher instance shared across handlers
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, send_timeout: Duration) -> Self {
        Self {
            mailer,
            send_timeout,
        }
    }

    /// Send with the default timeout
    pub async fn send(&self, mail: Outbound) -> Result<(), NotifyError> {
        self.send_with_timeout(mail, self.send_timeout).await
    }

    /// Send, abandoning the attempt when the timer wins the race. The
    /// underlying transport is not cancelled and may still complete.
    pub async fn send_with_timeout(
        &self,
        mail: Outbound,
        timeout: Duration,
    ) -> Result<(), NotifyError> {
        match tokio::time::timeout(timeout, self.mailer.send(&mail)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout.as_secs())),
        }
    }

    /// Fire-and-forget send for lifecycle side-effects. The triggering
    /// action has already succeeded; a failed email is logged, nothing more.
    pub fn dispatch_detached(&self, mail: Outbound) {
        let mailer = Arc::clone(&self.mailer);
        let timeout = self.send_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, mailer.send(&mail)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(timeout.as_secs())),
            };
            if let Err(e) = result {
                tracing::warn!(to = %mail.to, subject = %mail.subject, "Notification email failed: {}", e);
            }
        });
    }
}

/// Map a send failure onto a user-readable message by substring matching on
/// the transport's error text
pub fn classify_send_error(err: &NotifyError) -> String {
    if let NotifyError::Timeout(_) = err {
        return "SMTP connection timed out. Check SMTP server and firewall.".to_string();
    }

    let text = err.to_string();
    let lower = text.to_lowercase();

    if lower.contains("connection refused") || lower.contains("econnrefused") {
        "SMTP server unreachable. Check SMTP_HOST and SMTP_PORT.".to_string()
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "SMTP connection timed out. Check SMTP server and firewall.".to_string()
    } else if lower.contains("invalid login")
        || lower.contains("authentication")
        || lower.contains("credentials")
    {
        "SMTP auth failed. Check SMTP_USER and SMTP_PASS.".to_string()
    } else {
        format!("Email send failed: {}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingMailer {
        sends: AtomicUsize,
        fail_with: Option<String>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, _mail: &Outbound) -> Result<(), NotifyError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(msg) => Err(NotifyError::Transport(msg.clone())),
                None => Ok(()),
            }
        }
    }

    struct HangingMailer;

    #[async_trait::async_trait]
    impl Mailer for HangingMailer {
        async fn send(&self, _mail: &Outbound) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_reaches_mailer() {
        let mailer = Arc::new(RecordingMailer {
            sends: AtomicUsize::new(0),
            fail_with: None,
        });
        let dispatcher = Dispatcher::new(mailer.clone(), Duration::from_secs(5));

        let result = dispatcher
            .send(Outbound::new("a@b.com", "Hi", "Body"))
            .await;
        assert!(result.is_ok());
        assert_eq!(mailer.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_send_times_out() {
        let dispatcher = Dispatcher::new(Arc::new(HangingMailer), Duration::from_millis(50));
        let result = dispatcher
            .send(Outbound::new("a@b.com", "Hi", "Body"))
            .await;
        assert!(matches!(result, Err(NotifyError::Timeout(_))));
    }

    #[test]
    fn classification_by_substring() {
        let refused = NotifyError::Transport("Connection refused (os error 111)".to_string());
        assert!(classify_send_error(&refused).contains("unreachable"));

        let timed_out = NotifyError::Transport("operation timed out".to_string());
        assert!(classify_send_error(&timed_out).contains("timed out"));

        assert!(classify_send_error(&NotifyError::Timeout(10)).contains("timed out"));

        let auth = NotifyError::Transport("Invalid login: 535 5.7.8".to_string());
        assert!(classify_send_error(&auth).contains("auth failed"));

        let other = NotifyError::Transport("kaboom".to_string());
        assert!(classify_send_error(&other).contains("kaboom"));
    }
}

//! Console transport (development / unconfigured email)

use super::{Mailer, NotifyError, Outbound};

/// Logs every email instead of sending it. Used when SMTP settings are
/// absent so lifecycle side-effects remain observable in development.
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: &Outbound) -> Result<(), NotifyError> {
        println!();
        println!("========================================");
        println!("  EMAIL TO: {}", mail.to);
        println!("  SUBJECT:  {}", mail.subject);
        println!("----------------------------------------");
        println!("{}", mail.body);
        println!("========================================");
        println!();

        tracing::info!(to = %mail.to, subject = %mail.subject, "Email logged (console transport)");

        Ok(())
    }
}

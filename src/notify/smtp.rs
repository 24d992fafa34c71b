//! SMTP transport (production)

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::template::branded_html;
use super::{Mailer, NotifyError, Outbound};
use crate::config::SmtpSettings;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    portal_url: String,
}

impl SmtpMailer {
    pub fn new(
        settings: &SmtpSettings,
        from_email: &str,
        from_name: &str,
        portal_url: &str,
    ) -> Result<Self, NotifyError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| NotifyError::Transport(format!("Failed to create SMTP transport: {}", e)))?
            .port(settings.port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", from_name, from_email)
            .parse()
            .map_err(|e| NotifyError::InvalidAddress(format!("{} ({})", from_email, e)))?;

        Ok(Self {
            transport,
            from,
            portal_url: portal_url.to_string(),
        })
    }

    /// Probe the SMTP connection (the `SMTP_VERIFY` startup option)
    pub async fn test_connection(&self) -> bool {
        self.transport.test_connection().await.unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &Outbound) -> Result<(), NotifyError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| NotifyError::InvalidAddress(format!("{} ({})", mail.to, e)))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());

        if let Some(ref reply_to) = mail.reply_to {
            let addr: Mailbox = reply_to
                .parse()
                .map_err(|e| NotifyError::InvalidAddress(format!("{} ({})", reply_to, e)))?;
            builder = builder.reply_to(addr);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                mail.body.clone(),
                branded_html(&mail.body, &self.portal_url),
            ))
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Email sent");
        Ok(())
    }
}

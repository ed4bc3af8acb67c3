//! Email dispatch — SMTP sending via async lettre.
//!
//! Stateless: builds a transport per send, one outbound message per call,
//! no retries. Retry policy belongs to the caller.

use async_trait::async_trait;
use taskdeck_core::config::SmtpConfig;
use taskdeck_core::error::{Result, TaskDeckError};
use taskdeck_core::traits::Notifier;

/// SMTP mailer — sends plain-text notifications through a STARTTLS relay.
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Send a single email (async SMTP).
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_name = self.config.from_name.as_deref().unwrap_or("TaskDeck");
        let from_email = if self.config.from_email.is_empty() {
            &self.config.username
        } else {
            &self.config.from_email
        };
        let from_mailbox: Mailbox = format!("{from_name} <{from_email}>")
            .parse()
            .map_err(|e| TaskDeckError::Delivery(format!("Invalid from: {e}")))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| TaskDeckError::Delivery(format!("Invalid to: {e}")))?;

        let email = LettreMessage::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TaskDeckError::Delivery(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer =
            AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| TaskDeckError::Delivery(format!("SMTP relay: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .timeout(Some(std::time::Duration::from_secs(
                    self.config.send_timeout_secs,
                )))
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| TaskDeckError::Delivery(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.send_email(to, subject, body).await
    }
}

/// Fallback notifier used when SMTP is disabled — logs the message and
/// reports success so the workflow paths stay exercised.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!("📭 SMTP disabled — would email {to}: {subject}");
        Ok(())
    }
}

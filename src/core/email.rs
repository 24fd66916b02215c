//! Email delivery - SMTP sender plus log / in-memory senders for development and tests
//!
//! Handlers only see the `EmailSender` trait object stored in `AppState`.

use crate::core::config::SmtpSettings;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Email ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug)]
pub struct EmailError(pub String);

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "email delivery failed: {}", self.0)
    }
}

impl std::error::Error for EmailError {}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError>;

    /// Sender name for logging
    fn name(&self) -> &'static str;
}

// ************************* SMTP ************************* //

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| EmailError(format!("invalid from address: {}", e)))?;

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| EmailError(format!("failed to create SMTP relay: {}", e)))?
        } else {
            // plain transport for local catchers like Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        let mut builder = builder.port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError(format!("invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| EmailError(format!("failed to build message: {}", e)))?;

        self.transport.send(message).await.map_err(|e| {
            error!("SMTP send failed: {}", e);
            EmailError(e.to_string())
        })?;

        info!("Email sent via SMTP");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

// ************************* LOG ************************* //

/// Writes emails to the log instead of sending them
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "Email (not sent, SMTP disabled)");
        debug!("Email body:\n{}", email.body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// ************************* IN MEMORY ************************* //

/// Keeps every email in memory, used by integration tests to read tokens
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Last email sent to `to`, if any
    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to.eq_ignore_ascii_case(to))
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        self.sent
            .lock()
            .map_err(|_| EmailError("recording mailbox poisoned".to_string()))?
            .push(email);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str, body: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Hello".to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn recording_sender_keeps_messages() {
        let sender = RecordingEmailSender::new();
        sender.send(message("a@b.io", "first")).await.unwrap();
        sender.send(message("a@b.io", "second")).await.unwrap();
        sender.send(message("c@d.io", "other")).await.unwrap();

        assert_eq!(sender.sent().len(), 3);
        let last = sender.last_to("A@B.io").unwrap();
        assert_eq!(last.body, "second");
        assert!(sender.last_to("x@y.io").is_none());
    }
}

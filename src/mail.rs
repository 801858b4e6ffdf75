//! Outgoing email: activation and password-reset messages.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tera::Context;

use crate::{
    config::{Config, EmailBackend},
    error::AppError,
    templates,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Renders a plain-text body from `emails/<template>`.
    pub fn from_template(
        to: &str,
        subject: &str,
        template: &str,
        context: &Context,
    ) -> Result<Self, AppError> {
        Ok(Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: templates::render(template, context)?,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

/// Relays through an SMTP server with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let host = config.smtp_host.as_deref().ok_or_else(|| {
            AppError::InternalServerError("SMTP_HOST must be set for the smtp backend".to_string())
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .mail_from
            .parse::<Mailbox>()
            .map_err(|e| AppError::InternalServerError(format!("MAIL_FROM is invalid: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            tracing::error!("Failed to send email to {}: {:?}", email.to, e);
            AppError::InternalServerError(e.to_string())
        })?;

        tracing::info!("Email sent to {}", email.to);
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Outgoing email\n{}",
            email.body
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email);
        Ok(())
    }
}

/// Picks the backend named by `EMAIL_BACKEND`.
pub fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    Ok(match config.email_backend {
        EmailBackend::Smtp => Arc::new(SmtpMailer::new(config)?),
        EmailBackend::Console => Arc::new(ConsoleMailer),
        EmailBackend::Memory => Arc::new(MemoryMailer::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_collects_messages() {
        let mailer = MemoryMailer::new();
        let shared: Arc<dyn Mailer> = Arc::new(mailer.clone());

        shared
            .send(OutgoingEmail {
                to: "reader@example.com".into(),
                subject: "Hello".into(),
                body: "Body".into(),
            })
            .await
            .unwrap();

        let outbox = mailer.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "reader@example.com");
    }

    #[test]
    fn activation_email_contains_link() {
        let mut context = Context::new();
        context.insert("name", "Reader");
        context.insert("username", "reader");
        context.insert("link", "http://localhost:3000/accounts/activate/NDI/tok");
        context.insert("site_url", "http://localhost:3000");
        let email = OutgoingEmail::from_template(
            "reader@example.com",
            "Activate your account",
            "emails/activation.txt",
            &context,
        )
        .unwrap();
        assert!(email.body.contains("/accounts/activate/NDI/tok"));
    }
}

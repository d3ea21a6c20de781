//! Mail delivery behind a provider trait
//!
//! The worker only sees `MailProvider`, so tests can stub delivery and the
//! SMTP relay stays an implementation detail.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use sentra_common::config::SmtpConfig;
use sentra_common::{Error, Result};
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::debug;
use uuid::Uuid;

/// Delivery failure, split by whether a retry can help
#[derive(Debug, ThisError)]
pub enum MailError {
    #[error("temporary delivery failure: {0}")]
    Transient(String),
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

/// One message ready for delivery
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}

/// Delivery seam between the worker and the outside world
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Deliver one message, returning the provider message id
    async fn send(&self, email: &OutboundEmail) -> std::result::Result<String, MailError>;
}

/// SMTP relay provider
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay transport from configuration
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| Error::Mail(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let transport = builder.timeout(Some(Duration::from_secs(30))).build();

        Ok(Self { transport })
    }

    fn build_message(email: &OutboundEmail) -> std::result::Result<Message, MailError> {
        let from = Mailbox::new(
            email.from_name.clone(),
            email
                .from_address
                .parse()
                .map_err(|e| MailError::Permanent(format!("Invalid from address: {}", e)))?,
        );
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailError::Permanent(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match (&email.html_body, &email.text_body) {
            (Some(html), Some(text)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(text.clone()))
                    .singlepart(SinglePart::html(html.clone())),
            ),
            (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
            (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone()),
            (None, None) => {
                return Err(MailError::Permanent("Message has no body".to_string()));
            }
        };

        message.map_err(|e| MailError::Permanent(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl MailProvider for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> std::result::Result<String, MailError> {
        let message = Self::build_message(email)?;

        match self.transport.send(message).await {
            Ok(response) => {
                debug!("SMTP accepted: {:?}", response);
                let provider_id = response
                    .message()
                    .next()
                    .map(|line| line.to_string())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                Ok(provider_id)
            }
            Err(e) => {
                if e.is_permanent() {
                    Err(MailError::Permanent(e.to_string()))
                } else {
                    Err(MailError::Transient(e.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "rcpt@example.com".to_string(),
            from_address: "news@example.com".to_string(),
            from_name: Some("Newsletter".to_string()),
            subject: "Hello".to_string(),
            html_body: Some("<p>hi</p>".to_string()),
            text_body: Some("hi".to_string()),
        }
    }

    #[test]
    fn test_build_message_multipart() {
        let message = SmtpMailer::build_message(&email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let mut bad = email();
        bad.to = "not an address".to_string();
        assert!(matches!(
            SmtpMailer::build_message(&bad),
            Err(MailError::Permanent(_))
        ));
    }

    #[test]
    fn test_build_message_requires_body() {
        let mut empty = email();
        empty.html_body = None;
        empty.text_body = None;
        assert!(matches!(
            SmtpMailer::build_message(&empty),
            Err(MailError::Permanent(_))
        ));
    }
}

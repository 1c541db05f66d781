//! Email notifications: due-date reminders and reservation notices

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::{str::FromStr, sync::Arc};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// Outgoing mail transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP transport built from configuration
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from_name = config.smtp_from_name.as_deref().unwrap_or("BookFlow");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.smtp_use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let to = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        // lettre's SmtpTransport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Writes messages to the log; used when email is disabled
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to, subject, body, "Email disabled, message not sent");
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn from_config(config: &EmailConfig) -> AppResult<Self> {
        let mailer: Arc<dyn Mailer> = if config.enabled {
            Arc::new(SmtpMailer::new(config)?)
        } else {
            Arc::new(LogMailer)
        };
        Ok(Self::new(mailer))
    }

    /// Remind a reader that a loan is past due. Returns whether the mail went out.
    pub async fn send_due_reminder(&self, to: &str, name: &str, title: &str, due: DateTime<Utc>) -> bool {
        let subject = format!("Reminder: \"{}\" is due", title);
        let body = format!(
            r#"Hello {name},

The book "{title}" you borrowed was due on {due}.
Please return it as soon as possible. Overdue loans cannot be renewed and are fined per day.

BookFlow Library
"#,
            name = name,
            title = title,
            due = due.format("%Y-%m-%d"),
        );
        self.deliver(to, &subject, &body).await
    }

    /// Tell the first reader in line that a reserved book is back
    pub async fn send_reservation_available(&self, to: &str, name: &str, title: &str, expiry: DateTime<Utc>) -> bool {
        let subject = format!("\"{}\" is available", title);
        let body = format!(
            r#"Hello {name},

The book "{title}" you reserved has been returned and is ready to borrow.
Your reservation is kept until {expiry}.

BookFlow Library
"#,
            name = name,
            title = title,
            expiry = expiry.format("%Y-%m-%d"),
        );
        self.deliver(to, &subject, &body).await
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> bool {
        match self.mailer.send(to, subject, body).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(to, subject, error = %e, "Failed to send notification");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_due_reminder_content() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .with(
                eq("reader@example.com"),
                function(|subject: &str| subject.contains("Dune")),
                function(|body: &str| {
                    body.contains("2024-03-01")
                        && body.contains("Avid Reader")
                        && !body.contains("return or renew")
                }),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = EmailService::new(Arc::new(mailer));
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(service.send_due_reminder("reader@example.com", "Avid Reader", "Dune", due).await);
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(AppError::Internal("smtp down".into())));

        let service = EmailService::new(Arc::new(mailer));
        let sent = service
            .send_reservation_available("reader@example.com", "Avid Reader", "Dune", Utc::now())
            .await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_disabled_email_logs_only() {
        let service = EmailService::from_config(&EmailConfig::default()).unwrap();
        assert!(service.send_due_reminder("a@b.c", "A", "B", Utc::now()).await);
    }
}

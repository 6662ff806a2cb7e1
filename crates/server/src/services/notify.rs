//! Outbound customer notifications.
//!
//! SMS delivery is a logging stub. Email goes out over SMTP via lettre when
//! `SMTP_*` is configured and is logged otherwise. Callers treat delivery as
//! best effort: failures are logged and never reach the client.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use ubuntu_lend_core::{ApplicationId, ApplicationStatus, Email, PhoneNumber};

use crate::config::EmailConfig;

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

#[derive(Clone)]
struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Sends SMS and email notifications.
#[derive(Clone)]
pub struct Notifier {
    mailer: Option<SmtpMailer>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("smtp", &self.mailer.is_some())
            .finish()
    }
}

impl Notifier {
    /// Create a notifier, with SMTP delivery if configured.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let mailer = config
            .map(|config| {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );
                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                Ok::<_, SmtpError>(SmtpMailer {
                    transport,
                    from_address: config.from_address.clone(),
                })
            })
            .transpose()?;
        Ok(Self { mailer })
    }

    /// A notifier that only logs.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { mailer: None }
    }

    /// Send an SMS. No gateway is wired up; the message is logged.
    pub fn send_sms(&self, to: &PhoneNumber, body: &str) {
        if cfg!(debug_assertions) {
            tracing::info!(to = %to, body = %body, "SMS (not delivered)");
        } else {
            tracing::info!(to_last_four = %to.last_four(), "SMS (not delivered)");
        }
    }

    /// Deliver a one-time sign-in code by SMS.
    pub fn send_otp(&self, to: &PhoneNumber, code: &str, ttl_minutes: u64) {
        self.send_sms(
            to,
            &format!("Your Ubuntu Lend code is {code}. It expires in {ttl_minutes} minutes."),
        );
    }

    /// Send a plain-text email.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_email(&self, to: &Email, subject: &str, body: &str) -> Result<(), NotifyError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %subject, "Email (SMTP not configured)");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                mailer
                    .from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(mailer.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        mailer.transport.send(message).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }

    /// Tell an applicant their application moved to `status`. Failures are logged.
    pub async fn application_status_changed(
        &self,
        to: &Email,
        name: &str,
        application_id: ApplicationId,
        status: ApplicationStatus,
        reason: Option<&str>,
    ) {
        let (subject, body) = status_message(name, &application_id.to_string(), status, reason);
        if let Err(e) = self.send_email(to, &subject, &body).await {
            tracing::warn!(error = %e, to = %to, "Failed to send status notification");
        }
    }
}

fn status_message(
    name: &str,
    application_id: &str,
    status: ApplicationStatus,
    reason: Option<&str>,
) -> (String, String) {
    let subject = format!("Your loan application #{application_id} is {status}");
    let detail = match status {
        ApplicationStatus::Approved => {
            "Good news! Your application has been approved. Funds will be disbursed shortly."
                .to_string()
        }
        ApplicationStatus::Rejected => format!(
            "Unfortunately your application was not approved.\n\nReason: {}",
            reason.unwrap_or("not specified")
        ),
        ApplicationStatus::Disbursed => {
            "Your loan has been disbursed to your bank account.".to_string()
        }
        ApplicationStatus::Completed => {
            "Your loan is fully repaid. Thank you for borrowing with Ubuntu Lend.".to_string()
        }
        ApplicationStatus::Defaulted => {
            "Your loan is overdue. Please contact us to arrange repayment.".to_string()
        }
        ApplicationStatus::Pending => "Your application is under review.".to_string(),
    };
    (subject, format!("Hello {name},\n\n{detail}\n\nUbuntu Lend"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_includes_reason() {
        let (subject, body) = status_message(
            "Thandi",
            "42",
            ApplicationStatus::Rejected,
            Some("income too low"),
        );
        assert_eq!(subject, "Your loan application #42 is rejected");
        assert!(body.starts_with("Hello Thandi,"));
        assert!(body.contains("income too low"));
    }

    #[tokio::test]
    async fn test_disabled_notifier_logs_email() {
        let notifier = Notifier::disabled();
        let to = Email::parse("kofi@example.com").expect("valid email");
        assert!(notifier.send_email(&to, "hi", "body").await.is_ok());
    }
}

//! Send emails for contact-form and newsletter events.
//!
//! The [`Mailer`] owns the one transport handle built at startup and
//! exposes one dispatch operation per event. Every operation returns a
//! [`SendResult`]; transport failures are converted, never re-thrown.

pub mod envelope;
pub mod templates;
pub mod transport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

pub use envelope::Envelope;
pub use transport::Transport;

use crate::config::Configuration;
use templates::Branding;

/// Errors raised while building or handing off a message.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(&'static str),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("mail API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("mail API request failed: {0}")]
    Http(String),
}

/// Contact-form submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 200,
        message = "Subject must be between 1 and 200 characters."
    ))]
    pub subject: String,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Message must be between 1 and 5000 characters."
    ))]
    pub message: String,
    pub document_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[validate(custom(
        function = "validate_ip",
        message = "IP address must be IPv4 or IPv6."
    ))]
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Newsletter signup awaiting double-opt-in.
///
/// The verification token is opaque here, issued by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSignup {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(
        min = 32,
        message = "Verification token must be at least 32 characters."
    ))]
    pub verification_token: String,
    #[validate(length(
        min = 1,
        max = 50,
        message = "Source must be between 1 and 50 characters."
    ))]
    pub source: String,
    #[validate(url(message = "Source URL must be a valid URL."))]
    pub source_url: Option<String>,
}

/// Subscriber whose address has been verified.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscriber {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn validate_ip(ip: &str) -> Result<(), ValidationError> {
    ip.parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("ip_address"))
}

/// Uniform outcome of every dispatch operation.
///
/// `success == false` implies `error` is set; `success == true`
/// implies `message_id` is set, and `verification_url` as well for
/// verification sends.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub verification_url: Option<String>,
}

impl SendResult {
    fn sent(message_id: String) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
            verification_url: None,
        }
    }

    fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.to_string()),
            verification_url: None,
        }
    }
}

/// Email dispatch service.
#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from: String,
    admin_email: String,
    branding: Branding,
}

impl Mailer {
    /// Create a new [`Mailer`] around an already configured transport.
    pub fn new(transport: Transport, config: &Configuration) -> Self {
        Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
            admin_email: config.admin_email.clone(),
            branding: Branding {
                product: config.from_name.clone(),
                frontend_url: config.frontend_url.clone(),
                admin_url: config.admin_url.clone(),
            },
        }
    }

    /// Confirmation copy sent back to a contact-form submitter.
    pub async fn send_contact_welcome(
        &self,
        message: &ContactMessage,
    ) -> SendResult {
        let rendered = templates::contact_welcome(message, &self.branding);
        let envelope = Envelope::builder()
            .from(self.from.as_str())
            .to(message.email.as_str())
            .subject(rendered.subject)
            .html(rendered.html)
            .text(rendered.text)
            .build();

        self.dispatch(envelope).await
    }

    /// Staff notification for a new contact-form submission.
    pub async fn send_contact_admin_notice(
        &self,
        message: &ContactMessage,
    ) -> SendResult {
        let rendered =
            templates::contact_admin_notice(message, &self.branding);
        let mut builder = Envelope::builder()
            .from(self.from.as_str())
            .to(self.admin_email.as_str())
            .reply_to(message.email.as_str())
            .subject(rendered.subject)
            .html(rendered.html)
            .text(rendered.text);
        if let Some(document_id) = &message.document_id {
            builder = builder.header("X-Document-Id", document_id.as_str());
        }
        if let Some(ip_address) = &message.ip_address {
            builder = builder.header("X-Origin-Ip", ip_address.as_str());
        }

        self.dispatch(builder.build()).await
    }

    /// Double-opt-in verification request.
    ///
    /// On success the result carries the exact verification URL
    /// embedded in the email.
    pub async fn send_newsletter_verification(
        &self,
        signup: &NewsletterSignup,
    ) -> SendResult {
        let verification_url = format!(
            "{}/verify-email?token={}",
            self.branding.frontend_url, signup.verification_token
        );
        let rendered = templates::newsletter_verification(
            signup,
            &verification_url,
            &self.branding,
        );
        let envelope = Envelope::builder()
            .from(self.from.as_str())
            .to(signup.email.as_str())
            .subject(rendered.subject)
            .html(rendered.html)
            .text(rendered.text)
            .header("List-Unsubscribe", self.unsubscribe_header())
            .build();

        let mut result = self.dispatch(envelope).await;
        if result.success {
            result.verification_url = Some(verification_url);
        }
        result
    }

    /// Welcome message once the subscriber verified their address.
    pub async fn send_newsletter_welcome(
        &self,
        subscriber: &NewsletterSubscriber,
    ) -> SendResult {
        let rendered =
            templates::newsletter_welcome(subscriber, &self.branding);
        let envelope = Envelope::builder()
            .from(self.from.as_str())
            .to(subscriber.email.as_str())
            .subject(rendered.subject)
            .html(rendered.html)
            .text(rendered.text)
            .header("List-Unsubscribe", self.unsubscribe_header())
            .build();

        self.dispatch(envelope).await
    }

    fn unsubscribe_header(&self) -> String {
        format!("<{}/newsletter/unsubscribe>", self.branding.frontend_url)
    }

    /// One attempt against the transport; errors become a failed
    /// result and stop here.
    async fn dispatch(
        &self,
        envelope: Result<Envelope, MailError>,
    ) -> SendResult {
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "cannot assemble envelope");
                return SendResult::failed(err);
            },
        };

        match self.transport.send(&envelope).await {
            Ok(message_id) => {
                tracing::debug!(%message_id, "email accepted by transport");
                SendResult::sent(message_id)
            },
            Err(err) => {
                tracing::warn!(error = %err, "email rejected by transport");
                SendResult::failed(err)
            },
        }
    }
}

//! Outbound mail transports.
//!
//! One handle is built at startup from the configured provider and
//! shared, read-only, by every request. Enum dispatch keeps the fixed
//! provider set exhaustive without trait objects.

use lettre::message::header::{HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;

#[cfg(test)]
use lettre::transport::stub::AsyncStubTransport;

use super::MailError;
use super::envelope::Envelope;
use crate::config::{self, Configuration, Provider, SmtpTls};

const ID_LENGTH: usize = 12;
const MESSAGE_ID_DOMAIN: &str = "courier.local";
const MAILGUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configured mail-sending handle.
#[derive(Clone)]
pub enum Transport {
    /// Mailgun HTTP API.
    Mailgun(MailgunTransport),
    /// Generic SMTP relay.
    Smtp(SmtpTransport),
    /// Captured test inbox returning a preview reference.
    Sandbox(SandboxTransport),
    #[cfg(test)]
    Stub(AsyncStubTransport),
}

impl Transport {
    /// Build the transport selected by `email_provider`.
    pub fn from_config(config: &Configuration) -> Result<Self, MailError> {
        match config.email_provider {
            Provider::Mailgun => {
                let section = config
                    .mailgun
                    .as_ref()
                    .ok_or(MailError::MissingConfig("mailgun"))?;
                Ok(Transport::Mailgun(MailgunTransport::new(section)?))
            },
            Provider::Smtp => {
                let section = config
                    .smtp
                    .as_ref()
                    .ok_or(MailError::MissingConfig("smtp"))?;
                Ok(Transport::Smtp(SmtpTransport::new(section)?))
            },
            Provider::Sandbox => {
                let section = config
                    .sandbox
                    .as_ref()
                    .ok_or(MailError::MissingConfig("sandbox"))?;
                Ok(Transport::Sandbox(SandboxTransport::new(section)?))
            },
        }
    }

    /// Hand an envelope to the provider.
    ///
    /// Returns the provider message id on acceptance; the sandbox
    /// returns a preview reference instead. Exactly one attempt is
    /// made, errors are reported to the caller unchanged.
    pub async fn send(&self, envelope: &Envelope) -> Result<String, MailError> {
        let id = Alphanumeric.sample_string(&mut OsRng, ID_LENGTH);

        match self {
            Transport::Mailgun(mailgun) => mailgun.send(envelope, &id).await,
            Transport::Smtp(smtp) => {
                let message_id = format!("<{id}@{MESSAGE_ID_DOMAIN}>");
                smtp.send(envelope, message_id.clone()).await?;
                Ok(message_id)
            },
            Transport::Sandbox(sandbox) => sandbox.send(envelope, &id).await,
            #[cfg(test)]
            Transport::Stub(stub) => {
                let message_id = format!("<{id}@{MESSAGE_ID_DOMAIN}>");
                let message = to_message(envelope, message_id.clone())?;
                stub.send(message)
                    .await
                    .map_err(|err| MailError::Smtp(err.to_string()))?;
                Ok(message_id)
            },
        }
    }

    /// Transport accepting every message, for tests.
    #[cfg(test)]
    pub fn stub_ok() -> Self {
        Transport::Stub(AsyncStubTransport::new_ok())
    }

    /// Transport rejecting every message, for tests.
    #[cfg(test)]
    pub fn stub_error() -> Self {
        Transport::Stub(AsyncStubTransport::new_error())
    }
}

/// Mailgun HTTP API client.
#[derive(Clone)]
pub struct MailgunTransport {
    client: reqwest::Client,
    api_key: String,
    domain: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
}

impl MailgunTransport {
    fn new(config: &config::Mailgun) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(MAILGUN_TIMEOUT)
            .build()
            .map_err(|err| MailError::Http(err.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            domain: config.domain.clone(),
            endpoint: format!(
                "{}/{}/messages",
                config.region.base_url(),
                config.domain
            ),
        })
    }

    fn build_form(&self, envelope: &Envelope) -> multipart::Form {
        let mut form = multipart::Form::new()
            .text("from", envelope.from.clone())
            .text("subject", envelope.subject.clone())
            .text("text", envelope.text.clone())
            .text("html", envelope.html.clone());

        for to in &envelope.to {
            form = form.text("to", to.clone());
        }
        if let Some(reply_to) = &envelope.reply_to {
            form = form.text("h:Reply-To", reply_to.clone());
        }
        for (name, value) in &envelope.headers {
            form = form.text(format!("h:{name}"), value.clone());
        }

        form
    }

    async fn send(
        &self,
        envelope: &Envelope,
        fallback_id: &str,
    ) -> Result<String, MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .multipart(self.build_form(envelope))
            .send()
            .await
            .map_err(|err| MailError::Http(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MailError::Api { status, body });
        }

        let id = response
            .json::<MailgunResponse>()
            .await
            .ok()
            .and_then(|body| body.id)
            .unwrap_or_else(|| format!("<{fallback_id}@{}>", self.domain));
        Ok(id)
    }
}

/// SMTP relay handle.
#[derive(Clone)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    fn new(config: &config::Smtp) -> Result<Self, MailError> {
        let mut builder = match config.tls {
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                    &config.host,
                )
            },
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(
                &config.host,
            )
            .map_err(|err| MailError::Smtp(err.to_string()))?,
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
                    &config.host,
                )
                .map_err(|err| MailError::Smtp(err.to_string()))?
            },
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) =
            (&config.username, &config.password)
        {
            builder = builder
                .credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }

    async fn send(
        &self,
        envelope: &Envelope,
        message_id: String,
    ) -> Result<(), MailError> {
        let message = to_message(envelope, message_id)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| MailError::Smtp(err.to_string()))?;
        Ok(())
    }
}

/// Test inbox capturing mail without real delivery.
#[derive(Clone)]
pub struct SandboxTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    web_url: String,
}

impl SandboxTransport {
    fn new(config: &config::Sandbox) -> Result<Self, MailError> {
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|err| MailError::Smtp(err.to_string()))?
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build();

        Ok(Self {
            transport,
            web_url: config.web_url.clone(),
        })
    }

    fn preview_url(&self, id: &str) -> String {
        format!("{}/message/{id}", self.web_url)
    }

    async fn send(
        &self,
        envelope: &Envelope,
        id: &str,
    ) -> Result<String, MailError> {
        let message =
            to_message(envelope, format!("<{id}@{MESSAGE_ID_DOMAIN}>"))?;
        self.transport
            .send(message)
            .await
            .map_err(|err| MailError::Smtp(err.to_string()))?;
        Ok(self.preview_url(id))
    }
}

/// Assemble a MIME message from an envelope.
fn to_message(
    envelope: &Envelope,
    message_id: String,
) -> Result<Message, MailError> {
    let from: Mailbox = envelope
        .from
        .parse()
        .map_err(|_| MailError::InvalidAddress(envelope.from.clone()))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(envelope.subject.clone())
        .message_id(Some(message_id));

    for to in &envelope.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.clone()))?;
        builder = builder.to(mailbox);
    }
    if let Some(reply_to) = &envelope.reply_to {
        let mailbox: Mailbox = reply_to
            .parse()
            .map_err(|_| MailError::InvalidAddress(reply_to.clone()))?;
        builder = builder.reply_to(mailbox);
    }

    let mut message = builder
        .multipart(MultiPart::alternative_plain_html(
            envelope.text.clone(),
            envelope.html.clone(),
        ))
        .map_err(|err| MailError::Build(err.to_string()))?;

    for (name, value) in &envelope.headers {
        let name = HeaderName::new_from_ascii(name.clone())
            .map_err(|err| MailError::Build(err.to_string()))?;
        message
            .headers_mut()
            .insert_raw(HeaderValue::new(name, value.clone()));
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailgunRegion;

    fn envelope() -> Envelope {
        Envelope::builder()
            .from("Courier <no-reply@example.com>")
            .to("user@example.com")
            .subject("Hello")
            .html("<p>Hello</p>")
            .text("Hello")
            .header("List-Unsubscribe", "<https://example.com/unsubscribe>")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn stub_acceptance_yields_a_message_id() {
        let transport = Transport::stub_ok();

        let id = transport.send(&envelope()).await.unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with(&format!("@{MESSAGE_ID_DOMAIN}>")));
    }

    #[tokio::test]
    async fn stub_rejection_surfaces_the_error() {
        let transport = Transport::stub_error();

        let err = transport.send(&envelope()).await.unwrap_err();
        assert!(matches!(err, MailError::Smtp(_)));
    }

    #[tokio::test]
    async fn unparsable_sender_is_rejected_before_the_wire() {
        let transport = Transport::stub_ok();
        let envelope = Envelope::builder()
            .from("not an address")
            .to("user@example.com")
            .subject("Hello")
            .html("<p></p>")
            .text("")
            .build()
            .unwrap();

        let err = transport.send(&envelope).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[test]
    fn mailgun_endpoint_follows_the_region() {
        let transport = MailgunTransport::new(&config::Mailgun {
            api_key: "key".into(),
            domain: "mg.example.com".into(),
            region: MailgunRegion::Eu,
        })
        .unwrap();

        assert_eq!(
            transport.endpoint,
            "https://api.eu.mailgun.net/v3/mg.example.com/messages"
        );
    }

    #[test]
    fn sandbox_preview_reference_points_at_the_inbox() {
        let sandbox = SandboxTransport::new(&config::Sandbox {
            host: "smtp.ethereal.email".into(),
            username: "user".into(),
            password: "pass".into(),
            web_url: "https://ethereal.email".into(),
        })
        .unwrap();

        assert_eq!(
            sandbox.preview_url("abc123"),
            "https://ethereal.email/message/abc123"
        );
    }
}

//! Outbound message value and builder.

use std::collections::HashMap;

use super::MailError;

/// A fully assembled outbound message ready for a transport.
///
/// Built per send and never reused.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Sender address, `Name <addr>` form accepted.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Optional reply-to address.
    pub reply_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
    /// Additional message headers.
    pub headers: HashMap<String, String>,
}

impl Envelope {
    /// Create a new envelope builder.
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }
}

/// Builder for constructing [`Envelope`] instances.
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    from: Option<String>,
    to: Vec<String>,
    reply_to: Option<String>,
    subject: Option<String>,
    html: Option<String>,
    text: Option<String>,
    headers: HashMap<String, String>,
}

impl EnvelopeBuilder {
    /// Set the sender address (required).
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Add a primary recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Set the reply-to address.
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the HTML body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Set the plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a message header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Build the envelope, validating required fields.
    pub fn build(self) -> Result<Envelope, MailError> {
        if self.to.is_empty() {
            return Err(MailError::Build("at least one recipient required".into()));
        }

        let from = self
            .from
            .ok_or_else(|| MailError::Build("from address required".into()))?;

        let subject = self
            .subject
            .ok_or_else(|| MailError::Build("subject required".into()))?;

        let html = self
            .html
            .ok_or_else(|| MailError::Build("html body required".into()))?;

        let text = self
            .text
            .ok_or_else(|| MailError::Build("text body required".into()))?;

        Ok(Envelope {
            from,
            to: self.to,
            reply_to: self.reply_to,
            subject,
            html,
            text,
            headers: self.headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_complete_envelope() {
        let envelope = Envelope::builder()
            .from("Courier <no-reply@example.com>")
            .to("user@example.com")
            .reply_to("visitor@example.com")
            .subject("Hello")
            .html("<p>Rich</p>")
            .text("Plain")
            .header("X-Document-Id", "doc-1")
            .build()
            .unwrap();

        assert_eq!(envelope.from, "Courier <no-reply@example.com>");
        assert_eq!(envelope.to, vec!["user@example.com"]);
        assert_eq!(envelope.reply_to.as_deref(), Some("visitor@example.com"));
        assert_eq!(envelope.headers.get("X-Document-Id").unwrap(), "doc-1");
    }

    #[test]
    fn build_requires_recipient() {
        let result = Envelope::builder()
            .from("a@b.com")
            .subject("Hi")
            .html("<p></p>")
            .text("")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_requires_from() {
        let result = Envelope::builder()
            .to("a@b.com")
            .subject("Hi")
            .html("<p></p>")
            .text("")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_requires_both_bodies() {
        let result = Envelope::builder()
            .from("a@b.com")
            .to("b@c.com")
            .subject("Hi")
            .html("<p></p>")
            .build();
        assert!(result.is_err());
    }
}

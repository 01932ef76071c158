//! Email body rendering.
//!
//! Pure functions mapping a payload to a subject plus HTML and
//! plain-text bodies. Payload fields are interpolated verbatim;
//! upstream validation bounds their length and format only.

use super::{ContactMessage, NewsletterSignup, NewsletterSubscriber};

/// Static identity substituted into every template.
#[derive(Debug, Clone)]
pub struct Branding {
    /// Sender display name.
    pub product: String,
    /// Public site base URL.
    pub frontend_url: String,
    /// Back-office base URL.
    pub admin_url: String,
}

/// Rendered email content.
#[derive(Debug)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Shared HTML shell around the per-template content.
fn shell(title: &str, inner: &str, product: &str) -> String {
    format!(
        "<!DOCTYPE html>\
<html>\
<body style=\"margin:0;padding:0;background-color:#f4f4f5;font-family:Helvetica,Arial,sans-serif;\">\
<div style=\"max-width:600px;margin:0 auto;padding:24px;\">\
<div style=\"background-color:#ffffff;border-radius:8px;padding:32px;\">\
<h1 style=\"font-size:20px;margin:0 0 16px;color:#18181b;\">{title}</h1>\
{inner}\
</div>\
<p style=\"font-size:12px;color:#71717a;text-align:center;margin-top:16px;\">{product}</p>\
</div>\
</body>\
</html>"
    )
}

/// Confirmation sent back to a contact-form submitter.
pub fn contact_welcome(message: &ContactMessage, branding: &Branding) -> Rendered {
    let Branding { product, .. } = branding;
    let name = &message.name;
    let subject = &message.subject;
    let body = &message.message;

    let inner = format!(
        "<p style=\"color:#3f3f46;\">Hi {name},</p>\
<p style=\"color:#3f3f46;\">Thanks for reaching out to {product}. We received your \
message and will get back to you shortly.</p>\
<p style=\"color:#3f3f46;\"><strong>Subject:</strong> {subject}</p>\
<blockquote style=\"border-left:3px solid #e4e4e7;margin:16px 0;padding:8px 16px;color:#52525b;\">{body}</blockquote>"
    );

    Rendered {
        subject: format!("Thanks for contacting {product}"),
        html: shell("We received your message", &inner, product),
        text: format!(
            "Hi {name},\n\n\
Thanks for reaching out to {product}. We received your message and will get back to you shortly.\n\n\
Subject: {subject}\n\n\
Your message:\n{body}\n\n\
— The {product} team\n"
        ),
    }
}

/// Staff notification for a new contact-form submission.
pub fn contact_admin_notice(message: &ContactMessage, branding: &Branding) -> Rendered {
    let Branding {
        product, admin_url, ..
    } = branding;

    let mut rows = vec![
        ("Name", message.name.clone()),
        ("Email", message.email.clone()),
        ("Subject", message.subject.clone()),
    ];
    if let Some(document_id) = &message.document_id {
        rows.push(("Document", document_id.clone()));
    }
    if let Some(created_at) = &message.created_at {
        rows.push(("Submitted at", created_at.to_rfc3339()));
    }
    if let Some(ip_address) = &message.ip_address {
        rows.push(("IP address", ip_address.clone()));
    }
    if let Some(user_agent) = &message.user_agent {
        rows.push(("User agent", user_agent.clone()));
    }

    let html_rows: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr>\
<td style=\"padding:4px 12px 4px 0;color:#71717a;white-space:nowrap;\">{label}</td>\
<td style=\"padding:4px 0;color:#18181b;\">{value}</td>\
</tr>"
            )
        })
        .collect();
    let text_rows: String = rows
        .iter()
        .map(|(label, value)| format!("{label}: {value}\n"))
        .collect();

    let body = &message.message;
    let inner = format!(
        "<table style=\"font-size:14px;border-collapse:collapse;\">{html_rows}</table>\
<blockquote style=\"border-left:3px solid #e4e4e7;margin:16px 0;padding:8px 16px;color:#52525b;\">{body}</blockquote>\
<p><a href=\"{admin_url}/contact\" style=\"color:#2563eb;\">Open the admin console</a></p>"
    );

    Rendered {
        subject: format!("New contact form submission: {}", message.subject),
        html: shell("New contact form submission", &inner, product),
        text: format!(
            "New contact form submission\n\n\
{text_rows}\n\
Message:\n{body}\n\n\
Admin console: {admin_url}/contact\n"
        ),
    }
}

/// Double-opt-in verification request for a newsletter signup.
pub fn newsletter_verification(
    signup: &NewsletterSignup,
    verification_url: &str,
    branding: &Branding,
) -> Rendered {
    let Branding { product, .. } = branding;
    let name = signup.first_name.as_deref().unwrap_or("there");
    let source = &signup.source;

    let inner = format!(
        "<p style=\"color:#3f3f46;\">Hi {name},</p>\
<p style=\"color:#3f3f46;\">You signed up for the {product} newsletter via {source}. \
Please confirm your email address to start receiving it.</p>\
<p style=\"margin:24px 0;\">\
<a href=\"{verification_url}\" style=\"background-color:#2563eb;color:#ffffff;\
padding:12px 24px;border-radius:6px;text-decoration:none;\">Confirm my email</a>\
</p>\
<p style=\"font-size:12px;color:#71717a;\">If the button does not work, copy this link \
into your browser:<br>{verification_url}</p>\
<p style=\"font-size:12px;color:#71717a;\">If you did not sign up, you can safely ignore \
this email.</p>"
    );

    Rendered {
        subject: format!("Confirm your {product} newsletter subscription"),
        html: shell("Confirm your subscription", &inner, product),
        text: format!(
            "Hi {name},\n\n\
You signed up for the {product} newsletter via {source}. Please confirm your email \
address to start receiving it:\n\n\
{verification_url}\n\n\
If you did not sign up, you can safely ignore this email.\n"
        ),
    }
}

/// Welcome message once a subscriber verified their address.
pub fn newsletter_welcome(
    subscriber: &NewsletterSubscriber,
    branding: &Branding,
) -> Rendered {
    let Branding {
        product,
        frontend_url,
        ..
    } = branding;
    let name = subscriber.first_name.as_deref().unwrap_or("there");

    let inner = format!(
        "<p style=\"color:#3f3f46;\">Hi {name},</p>\
<p style=\"color:#3f3f46;\">Your email address is confirmed. Welcome to the {product} \
newsletter; the next issue will land in this inbox.</p>\
<p style=\"margin:24px 0;\">\
<a href=\"{frontend_url}\" style=\"background-color:#2563eb;color:#ffffff;\
padding:12px 24px;border-radius:6px;text-decoration:none;\">Visit {product}</a>\
</p>"
    );

    Rendered {
        subject: format!("Welcome to the {product} newsletter"),
        html: shell("You're in", &inner, product),
        text: format!(
            "Hi {name},\n\n\
Your email address is confirmed. Welcome to the {product} newsletter; the next issue \
will land in this inbox.\n\n\
{frontend_url}\n"
        ),
    }
}

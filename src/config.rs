//! Configuration manager for courier.
//!
//! Every value is sourced from process environment variables. Nested
//! sections use a double-underscore separator, e.g. `MAILGUN__API_KEY`
//! maps to `mailgun.api_key`.

use std::fmt;
use std::sync::Arc;

use axum::extract::FromRef;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::AppState;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_NAME: &str = "Courier";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SANDBOX_WEB_URL: &str = "https://ethereal.email";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 900;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 100;

/// Errors raised while reading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid `{field}` URL: {source}")]
    Url {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    #[error("email provider `{provider}` requires the `{section}` configuration section")]
    MissingProviderSection {
        provider: Provider,
        section: &'static str,
    },
}

/// Outbound mail provider selection. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Mailgun,
    Smtp,
    Sandbox,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Mailgun => write!(f, "mailgun"),
            Provider::Smtp => write!(f, "smtp"),
            Provider::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Deployment environment, gating error detail exposure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Configuration {
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub environment: Environment,
    /// Tracing filter directive, e.g. `info` or `courier=debug`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Which transport sends outbound mail.
    pub email_provider: Provider,
    /// Sender address on every outbound message.
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Recipient of contact-form notifications.
    pub admin_email: String,
    /// Public site base, used for links inside emails.
    pub frontend_url: String,
    /// Back-office base, used for links inside staff notifications.
    pub admin_url: String,
    /// Shared secret expected in the `X-API-Key` header.
    pub api_key: String,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_requests: u64,
    /// Required when `email_provider` is `mailgun`.
    pub mailgun: Option<Mailgun>,
    /// Required when `email_provider` is `smtp`.
    pub smtp: Option<Smtp>,
    /// Required when `email_provider` is `sandbox`.
    pub sandbox: Option<Sandbox>,
}

/// Mailgun HTTP API credentials.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Mailgun {
    pub api_key: String,
    /// Sending domain registered with Mailgun.
    pub domain: String,
    #[serde(default)]
    pub region: MailgunRegion,
}

/// Mailgun API region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailgunRegion {
    #[default]
    Us,
    Eu,
}

impl MailgunRegion {
    /// API base for the region.
    pub fn base_url(self) -> &'static str {
        match self {
            MailgunRegion::Us => "https://api.mailgun.net/v3",
            MailgunRegion::Eu => "https://api.eu.mailgun.net/v3",
        }
    }
}

/// Generic SMTP relay credentials.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Smtp {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub tls: SmtpTls,
}

/// Connection security for the SMTP relay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    #[default]
    Starttls,
    Tls,
    None,
}

/// Captured test inbox, no real delivery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sandbox {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Base URL for message previews.
    #[serde(default = "default_sandbox_web_url")]
    pub web_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_from_name() -> String {
    DEFAULT_FROM_NAME.to_owned()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}

fn default_sandbox_web_url() -> String {
    DEFAULT_SANDBOX_WEB_URL.to_owned()
}

fn default_rate_limit_window() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

fn default_rate_limit_max() -> u64 {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    /// Reads the configuration from the process environment.
    ///
    /// Fails with a descriptive error when a value cannot be parsed,
    /// a required field is absent, or the section for the selected
    /// provider is missing.
    pub fn from_env() -> Result<Arc<Self>, ConfigError> {
        let source = config::Environment::default()
            .separator("__")
            .try_parsing(true);
        let config: Configuration = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        config.validated().map(Arc::new)
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    ///
    /// The trailing slash is stripped so the value can be concatenated
    /// with absolute paths.
    fn normalize_url(url: &str, field: &'static str) -> Result<String, ConfigError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)
            .map_err(|source| ConfigError::Url { field, source })?;
        Ok(parsed_url.to_string().trim_end_matches('/').to_owned())
    }

    /// Checks required fields and normalizes URLs.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::Empty("api_key"));
        }
        if self.from_email.is_empty() {
            return Err(ConfigError::Empty("from_email"));
        }
        if self.admin_email.is_empty() {
            return Err(ConfigError::Empty("admin_email"));
        }

        self.frontend_url =
            Self::normalize_url(&self.frontend_url, "frontend_url")?;
        self.admin_url = Self::normalize_url(&self.admin_url, "admin_url")?;

        let section = match self.email_provider {
            Provider::Mailgun if self.mailgun.is_none() => Some("mailgun"),
            Provider::Smtp if self.smtp.is_none() => Some("smtp"),
            Provider::Sandbox if self.sandbox.is_none() => Some("sandbox"),
            _ => None,
        };
        if let Some(section) = section {
            return Err(ConfigError::MissingProviderSection {
                provider: self.email_provider,
                section,
            });
        }

        Ok(self)
    }
}

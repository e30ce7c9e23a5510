use std::time::Duration;

use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the calling code runs. Server-side code reaches the backend over
/// the internal network, browser-side code over its public address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    Browser,
}

/// Client configuration.
///
/// Environment variables can be set directly or loaded from a .env file:
/// - API_URL: backend base URL for server-side code (required)
/// - PUBLIC_API_URL: backend base URL for browser-side code (defaults to
///   API_URL)
/// - DEFAULT_PAGE_SIZE: page size for list endpoints (defaults to 10)
/// - REQUEST_TIMEOUT_SECS: per-request timeout (defaults to 30)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_base_url: String,
    pub browser_base_url: String,
    pub default_page_size: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("{name} must be an absolute url, got {value:?}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

impl ClientConfig {
    /// Config pointing both contexts at the same backend.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base = normalize_base_url("API_URL", base_url)?;
        Ok(Self {
            server_base_url: base.clone(),
            browser_base_url: base,
            default_page_size: payloads::DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        // Silently ignore a missing .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let server = lookup("API_URL").ok_or(ConfigError::Missing("API_URL"))?;
        let server_base_url = normalize_base_url("API_URL", &server)?;
        let browser_base_url = match lookup("PUBLIC_API_URL") {
            Some(url) => normalize_base_url("PUBLIC_API_URL", &url)?,
            None => server_base_url.clone(),
        };
        let default_page_size = match lookup("DEFAULT_PAGE_SIZE") {
            Some(v) => parse_positive("DEFAULT_PAGE_SIZE", &v)?,
            None => payloads::DEFAULT_PAGE_SIZE,
        };
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                parse_positive("REQUEST_TIMEOUT_SECS", &v)?.into(),
            ),
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        Ok(Self {
            server_base_url,
            browser_base_url,
            default_page_size,
            request_timeout,
        })
    }

    pub fn base_url(&self, context: ExecutionContext) -> &str {
        match context {
            ExecutionContext::Server => &self.server_base_url,
            ExecutionContext::Browser => &self.browser_base_url,
        }
    }
}

/// Validate that `value` is absolute and drop any trailing slash so that
/// `<base><path>` never produces a double slash.
fn normalize_base_url(
    name: &'static str,
    value: &str,
) -> Result<String, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        }),
    }
}

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Endpoints and HTTP settings for the backend, the AI endpoint and the RAG service.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub api_base_url: Url,
    /// Base for the text-generation endpoint; falls back to `api_base_url`.
    pub ai_base_url: Option<Url>,
    /// Document service; RAG helpers are disabled when unset.
    pub rag_base_url: Option<Url>,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Configuration pointing every client at one base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` does not parse.
    pub fn with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_url("api base url", base_url)?,
            ai_base_url: None,
            rag_base_url: None,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read configuration from `BRSR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or the timeout is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url =
            env::var("BRSR_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        let mut config = Self::with_base_url(&api_base_url)?;

        config.ai_base_url = optional_var("BRSR_AI_BASE_URL")
            .map(|raw| parse_url("BRSR_AI_BASE_URL", &raw))
            .transpose()?;
        config.rag_base_url = optional_var("BRSR_RAG_BASE_URL")
            .map(|raw| parse_url("BRSR_RAG_BASE_URL", &raw))
            .transpose()?;
        config.api_token = optional_var("BRSR_API_TOKEN");

        if let Some(raw) = optional_var("BRSR_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidNumber {
                name: "BRSR_HTTP_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    #[must_use]
    pub fn ai_base(&self) -> &Url {
        self.ai_base_url.as_ref().unwrap_or(&self.api_base_url)
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl {
        name,
        value: raw.to_string(),
    })
}

/// Join a relative route onto a base URL without dropping the base path.
pub(crate) fn endpoint(base: &Url, route: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

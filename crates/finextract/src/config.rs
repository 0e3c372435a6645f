//! Endpoint credentials and sampling configuration
//!
//! Configuration is read once and passed by value into the transport;
//! nothing here is global or mutable after construction.

use crate::error::ConfigError;
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

pub use secrecy::SecretString;

/// Environment variable holding the access token
pub const ACCESS_TOKEN_VAR: &str = "SG_ACCESS_TOKEN";

/// Environment variable holding the models endpoint URL
pub const MODELS_ENDPOINT_VAR: &str = "SG_MODELS_ENDPOINT";

/// Environment variable holding the chat completions endpoint URL
pub const CHAT_COMPLETIONS_ENDPOINT_VAR: &str = "SG_CHAT_COMPLETIONS_ENDPOINT";

/// Environment variable holding the optional `X-Requested-With` value
pub const REQUESTED_WITH_VAR: &str = "X_Requested_With";

/// Default timeout for every network call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials and endpoints for the completion service
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Sent verbatim as the `Authorization` header
    pub access_token: SecretString,
    pub models_endpoint: String,
    pub chat_completions_endpoint: String,
    /// Optional `X-Requested-With` header value
    pub requested_with: Option<String>,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(
        access_token: impl Into<String>,
        models_endpoint: impl Into<String>,
        chat_completions_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            models_endpoint: models_endpoint.into(),
            chat_completions_endpoint: chat_completions_endpoint.into(),
            requested_with: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the `X-Requested-With` header value
    pub fn with_requested_with(mut self, value: impl Into<String>) -> Self {
        self.requested_with = Some(value.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, then validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self::new(
            required(ACCESS_TOKEN_VAR)?,
            required(MODELS_ENDPOINT_VAR)?,
            required(CHAT_COMPLETIONS_ENDPOINT_VAR)?,
        );
        config.requested_with = lookup(REQUESTED_WITH_VAR).filter(|v| !v.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Check that every required value is present and usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing(ACCESS_TOKEN_VAR));
        }
        validate_endpoint(MODELS_ENDPOINT_VAR, &self.models_endpoint)?;
        validate_endpoint(CHAT_COMPLETIONS_ENDPOINT_VAR, &self.chat_completions_endpoint)?;
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_endpoint(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(name));
    }
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{} (an absolute http(s) URL is required)", e),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme {}", scheme),
        }),
    }
}

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.3,
            top_p: 0.95,
        }
    }
}

impl SamplingParams {
    /// Check values against the accepted ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=4000).contains(&self.max_tokens) {
            return Err(ConfigError::Invalid {
                name: "max_tokens",
                reason: format!("{} is outside 100..=4000", self.max_tokens),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                name: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::Invalid {
                name: "top_p",
                reason: format!("{} is outside 0.0..=1.0", self.top_p),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_complete() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            (ACCESS_TOKEN_VAR, "token sgp_abc"),
            (MODELS_ENDPOINT_VAR, "https://sg.example.com/.api/llm/models"),
            (
                CHAT_COMPLETIONS_ENDPOINT_VAR,
                "https://sg.example.com/.api/llm/chat/completions",
            ),
            (REQUESTED_WITH_VAR, "finextract"),
        ]))
        .unwrap();

        assert_eq!(config.access_token.expose_secret(), "token sgp_abc");
        assert_eq!(config.requested_with.as_deref(), Some("finextract"));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_missing_token() {
        let err = ApiConfig::from_lookup(lookup_from(&[
            (MODELS_ENDPOINT_VAR, "https://sg.example.com/models"),
            (CHAT_COMPLETIONS_ENDPOINT_VAR, "https://sg.example.com/chat"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ACCESS_TOKEN_VAR)));
    }

    #[test]
    fn test_from_lookup_blank_values_are_missing() {
        let err = ApiConfig::from_lookup(lookup_from(&[
            (ACCESS_TOKEN_VAR, "t"),
            (MODELS_ENDPOINT_VAR, "  "),
            (CHAT_COMPLETIONS_ENDPOINT_VAR, "https://sg.example.com/chat"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(MODELS_ENDPOINT_VAR)));
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        let config = ApiConfig::new("t", "/.api/llm/models", "https://sg.example.com/chat");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(MODELS_ENDPOINT_VAR));
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = ApiConfig::new("super-secret", "https://a.example", "https://b.example");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_sampling_defaults_and_ranges() {
        let params = SamplingParams::default();
        assert_eq!(params.max_tokens, 1000);
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.top_p, 0.95);
        assert!(params.validate().is_ok());

        let params = SamplingParams {
            temperature: 2.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = SamplingParams {
            max_tokens: 50,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}

//! Error types for FinExtract

use crate::types::{CompletionResponse, ErrorBody};
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that can occur while fetching page content for a tool
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// URL is blocked by prefix list
    #[error("Blocked URL: prefix not allowed")]
    BlockedUrl,

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Request did not complete within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Failed to connect to server
    #[error("Failed to connect to server: {0}")]
    ConnectError(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(StatusCode),

    /// Content type cannot be turned into text
    #[error("Binary content is not supported ({0})")]
    BinaryContent(String),

    /// Page had no readable text after cleaning
    #[error("Page contained no readable text")]
    EmptyContent,

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            FetchError::ConnectError(err)
        } else {
            FetchError::RequestError(err.to_string())
        }
    }
}

/// Errors raised by the completion transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// A configured value cannot be used as a header
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Network-level failure (connect, timeout, reading the body)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("HTTP {status} for url: {url}")]
    Status {
        status: StatusCode,
        url: String,
        body: Option<ErrorBody>,
    },

    /// Endpoint answered 2xx but the body is not the expected document
    #[error("Invalid response from {url}: {message}")]
    Decode {
        url: String,
        message: String,
        body: Option<ErrorBody>,
    },
}

impl TransportError {
    /// HTTP status code, when the endpoint answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// Captured response body, decoded as JSON when possible
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            TransportError::Status { body, .. } | TransportError::Decode { body, .. } => {
                body.as_ref()
            }
            _ => None,
        }
    }
}

/// Errors that end a conversation without a final answer
///
/// Partial conversation state is discarded; only the error and the
/// most relevant response body survive.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Completion request failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Completion response had no choices to read a message from
    #[error("Completion response contained no choices")]
    EmptyChoices { response: Box<CompletionResponse> },

    /// Model kept requesting tools past the turn limit
    #[error("Conversation stopped after {turns} tool turns with tool calls still pending")]
    MaxTurnsExceeded {
        turns: usize,
        last_response: Box<CompletionResponse>,
    },
}

impl DriverError {
    /// Body to show alongside the error message
    pub fn body(&self) -> Option<ErrorBody> {
        match self {
            DriverError::Transport(err) => err.body().cloned(),
            DriverError::EmptyChoices { response } => {
                serde_json::to_value(response.as_ref()).ok().map(ErrorBody::Json)
            }
            DriverError::MaxTurnsExceeded { last_response, .. } => {
                serde_json::to_value(last_response.as_ref())
                    .ok()
                    .map(ErrorBody::Json)
            }
        }
    }

    /// Error report in the `{"error", "response_body"}` shape used for raw output
    pub fn report(&self) -> Value {
        match self.body() {
            Some(body) => json!({ "error": self.to_string(), "response_body": body }),
            None => json!({ "error": self.to_string() }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required value is absent or empty
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    /// Value is present but unusable
    #[error("Invalid configuration value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors raised inside the tool registry
///
/// These never cross the registry boundary; they are turned into
/// error tool results that the model gets to see.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments failed to decode or validate
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool ran and reported a failure
    #[error("{0}")]
    Execution(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_messages() {
        assert_eq!(
            FetchError::MissingUrl.to_string(),
            "Missing required parameter: url"
        );
        assert_eq!(
            FetchError::InvalidUrlScheme.to_string(),
            "Invalid URL: must start with http:// or https://"
        );
        assert_eq!(
            FetchError::BlockedUrl.to_string(),
            "Blocked URL: prefix not allowed"
        );
        assert_eq!(
            FetchError::Timeout(30).to_string(),
            "Request timed out after 30 seconds"
        );
        assert_eq!(
            FetchError::HttpStatus(StatusCode::NOT_FOUND).to_string(),
            "HTTP status 404 Not Found"
        );
    }

    #[test]
    fn test_transport_status_error() {
        let err = TransportError::Status {
            status: StatusCode::UNAUTHORIZED,
            url: "https://llm.example.com/chat".to_string(),
            body: Some(ErrorBody::Text("denied".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 401 Unauthorized for url: https://llm.example.com/chat"
        );
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.body(), Some(&ErrorBody::Text("denied".to_string())));
    }

    #[test]
    fn test_driver_error_report() {
        let err = DriverError::Transport(TransportError::Status {
            status: StatusCode::BAD_REQUEST,
            url: "https://llm.example.com/chat".to_string(),
            body: Some(ErrorBody::Json(json!({"detail": "bad model"}))),
        });
        let report = err.report();
        assert_eq!(
            report["error"],
            "HTTP 400 Bad Request for url: https://llm.example.com/chat"
        );
        assert_eq!(report["response_body"]["detail"], "bad model");

        let err = DriverError::Transport(TransportError::InvalidHeader("Authorization"));
        let report = err.report();
        assert!(report.get("response_body").is_none());
    }

    #[test]
    fn test_tool_error_messages() {
        assert_eq!(
            ToolError::UnknownTool("lookup".to_string()).to_string(),
            "Unknown tool: lookup"
        );
        assert_eq!(
            ToolError::InvalidArguments {
                tool: "fetch_url_content".to_string(),
                reason: "missing field `url`".to_string(),
            }
            .to_string(),
            "Invalid arguments for fetch_url_content: missing field `url`"
        );
    }
}

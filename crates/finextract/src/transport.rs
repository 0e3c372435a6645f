//! Completion transport
//!
//! Wraps the HTTP round trip to the chat completions endpoint: headers,
//! JSON encoding, and mapping of status codes to [`TransportError`].
//! The [`CompletionTransport`] trait is the seam the conversation driver
//! talks to, so tests can substitute a scripted transport.

use crate::config::ApiConfig;
use crate::error::TransportError;
use crate::types::{CompletionRequest, CompletionResponse, ErrorBody, ModelList};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

/// Header carrying the optional deployment marker
const REQUESTED_WITH: &str = "x-requested-with";

/// Longest body preview written to the log
const BODY_PREVIEW_CHARS: usize = 500;

/// Sends completion requests
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Send one request and decode the response
    async fn send(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, TransportError>;
}

/// HTTP transport for the chat completions and models endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpTransport {
    /// Build the transport; headers and timeout are fixed from `config`
    pub fn new(config: ApiConfig) -> Result<Self, TransportError> {
        let headers = default_headers(&config)?;
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// List the models offered by the endpoint
    pub async fn fetch_models(&self) -> Result<ModelList, TransportError> {
        let url = &self.config.models_endpoint;
        debug!(url = %url, "Fetching models");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Error fetching models");
            TransportError::Request(e)
        })?;

        read_json(response, url).await
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn send(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let url = &self.config.chat_completions_endpoint;
        debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(TransportError::Request)?;

        read_json(response, url).await
    }
}

fn default_headers(config: &ApiConfig) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut token = HeaderValue::from_str(config.access_token.expose_secret())
        .map_err(|_| TransportError::InvalidHeader("Authorization"))?;
    token.set_sensitive(true);
    headers.insert(AUTHORIZATION, token);

    if let Some(ref value) = config.requested_with {
        headers.insert(
            HeaderName::from_static(REQUESTED_WITH),
            HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader("X-Requested-With"))?,
        );
    }

    Ok(headers)
}

/// Read the body and decode it, capturing it on failure
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T, TransportError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        error!(
            url = %url,
            status = status.as_u16(),
            body = %preview(&text),
            "Endpoint returned an error status"
        );
        return Err(TransportError::Status {
            status,
            url: url.to_string(),
            body: captured_body(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        error!(url = %url, error = %e, body = %preview(&text), "Undecodable response body");
        TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
            body: captured_body(&text),
        }
    })
}

fn captured_body(text: &str) -> Option<ErrorBody> {
    if text.is_empty() {
        None
    } else {
        Some(ErrorBody::from_text(text))
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
    if text.chars().count() > BODY_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

//! Page content tool
//!
//! Fetches a URL with browser-like headers and returns the cleaned page
//! text: chrome elements stripped, entities decoded, whitespace collapsed.

use super::convert::{collapse_whitespace, html_to_text, is_html};
use super::{parse_args, Tool};
use crate::error::{FetchError, ToolError};
use crate::{DEFAULT_USER_AGENT, FETCH_URL_TOOL_NAME};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE,
    USER_AGENT,
};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

const TOOL_DESCRIPTION: &str = "Fetches content from a URL with proper headers to avoid blocking";

/// Default timeout for connecting and reading the body
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Appended when the body deadline cut the page short
const TIMEOUT_MESSAGE: &str = " [..more content timed out...]";

/// Binary content type prefixes
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
    "font/",
];

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Arguments of the page content tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchUrlArgs {
    /// The URL to extract content from
    pub url: String,
}

/// A fetched page before conversion
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
    /// Body deadline hit before the page finished downloading
    pub truncated: bool,
}

/// Builder for configuring the page content tool
#[derive(Debug, Clone, Default)]
pub struct FetchUrlToolBuilder {
    user_agent: Option<String>,
    allow_prefixes: Vec<String>,
    block_prefixes: Vec<String>,
    timeout: Option<Duration>,
}

impl FetchUrlToolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Add URL prefix to allow list
    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.allow_prefixes.push(prefix.into());
        self
    }

    /// Add URL prefix to block list
    pub fn block_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.block_prefixes.push(prefix.into());
        self
    }

    /// Set connect and body timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> FetchUrlTool {
        FetchUrlTool {
            user_agent: self.user_agent,
            allow_prefixes: self.allow_prefixes,
            block_prefixes: self.block_prefixes,
            timeout: self.timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

/// Configured page content tool
#[derive(Debug, Clone)]
pub struct FetchUrlTool {
    user_agent: Option<String>,
    allow_prefixes: Vec<String>,
    block_prefixes: Vec<String>,
    timeout: Duration,
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        FetchUrlToolBuilder::new().build()
    }
}

impl FetchUrlTool {
    pub fn builder() -> FetchUrlToolBuilder {
        FetchUrlToolBuilder::new()
    }

    /// Check scheme and prefix lists
    pub fn validate_url(&self, url: &str) -> Result<Url, FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::MissingUrl);
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::InvalidUrlScheme);
        }
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        if !self.allow_prefixes.is_empty()
            && !self.allow_prefixes.iter().any(|prefix| url.starts_with(prefix))
        {
            return Err(FetchError::BlockedUrl);
        }
        if self.block_prefixes.iter().any(|prefix| url.starts_with(prefix)) {
            return Err(FetchError::BlockedUrl);
        }

        Ok(parsed)
    }

    /// Download a page
    ///
    /// Non-2xx statuses and binary content types are errors. A body that
    /// does not finish within the timeout is returned partially.
    pub async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        let parsed = self.validate_url(url)?;

        let client = reqwest::Client::builder()
            .default_headers(self.headers())
            .connect_timeout(self.timeout)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let response = tokio::time::timeout_at(deadline, client.get(parsed).send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ref ct) = content_type {
            if is_binary_content_type(ct) {
                return Err(FetchError::BinaryContent(ct.clone()));
            }
        }

        let (body, truncated) = read_body_until(response, deadline)
            .await
            .map_err(FetchError::from_reqwest)?;
        if body.is_empty() && truncated {
            return Err(FetchError::Timeout(self.timeout.as_secs()));
        }

        Ok(Page {
            url: url.to_string(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
            truncated,
        })
    }

    /// Download a page and reduce it to a single line of text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        info!(url = %url, "Fetching page content");
        let page = self.fetch_page(url).await?;

        let mut text = if is_html(&page.content_type, &page.body) {
            html_to_text(&page.body)
        } else {
            collapse_whitespace(&page.body)
        };
        if text.is_empty() {
            return Err(FetchError::EmptyContent);
        }
        if page.truncated {
            text.push_str(TIMEOUT_MESSAGE);
        }

        info!(url = %url, chars = text.chars().count(), "Fetched page content");
        Ok(text)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        FETCH_URL_TOOL_NAME
    }

    fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    fn parameters(&self) -> Value {
        argument_schema::<FetchUrlArgs>()
    }

    async fn call(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: FetchUrlArgs = parse_args(self.name(), args)?;
        self.fetch_text(&args.url).await.map_err(|e| {
            let message = format!("Error fetching URL {}: {}", args.url, e);
            error!("{}", message);
            ToolError::Execution(message)
        })
    }
}

/// JSON Schema of an argument struct, without the `$schema`/`title` noise
pub(crate) fn argument_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// Check if content type indicates binary content
fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

/// Read the body until `deadline`, returning partial content if it passes.
/// A failed chunk read is an error even when some bytes already arrived.
async fn read_body_until(
    response: reqwest::Response,
    deadline: tokio::time::Instant,
) -> Result<(Bytes, bool), reqwest::Error> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        error!(received = body.len(), "Error reading body chunk: {}", e);
                        return Err(e);
                    }
                    None => return Ok((Bytes::from(body), false)),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("Body timeout reached, returning partial content");
                return Ok((Bytes::from(body), true));
            }
        }
    }
}

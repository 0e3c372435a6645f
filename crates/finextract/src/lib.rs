//! FinExtract - financial facts from news articles via tool-calling LLMs
//!
//! Give it a URL and a model; it asks the model to pull the company name,
//! stock symbol, revenue, net income and EPS out of the article. The model
//! reads the page through a local tool, and its answer is parsed into a
//! field map, or kept as a summary when too few fields come back.
//!
//! ## Pieces
//!
//! - [`ConversationDriver`] - the request, tool call, continuation loop
//! - [`ToolRegistry`] - named tools the model may call
//!   ([`FetchUrlTool`], [`ArticleTool`])
//! - [`HttpTransport`] - chat completions and models endpoints
//! - [`FieldExtractor`] - `Label: value` parsing of the final answer
//! - [`FinancialExtractor`] - all of the above for one URL

pub mod config;
pub mod driver;
mod error;
pub mod extract;
pub mod pipeline;
pub mod prompt;
pub mod tools;
pub mod transport;
mod types;

pub use config::{ApiConfig, SamplingParams, SecretString};
pub use driver::{ConversationDriver, UnknownToolPolicy, DEFAULT_MAX_TURNS};
pub use error::{ConfigError, DriverError, FetchError, ToolError, TransportError};
pub use extract::{ExtractedFields, Extraction, FieldExtractor};
pub use pipeline::{FinancialExtractor, Report};
pub use tools::{ArticleTool, FetchUrlTool, FnTool, Tool, ToolRegistry};
pub use transport::{CompletionTransport, HttpTransport};
pub use types::{
    Choice, CompletionRequest, CompletionResponse, ErrorBody, FunctionCall, FunctionSpec,
    Message, ModelInfo, ModelList, Role, ToolCall, ToolChoice, ToolResult, ToolSpec,
};

/// Browser User-Agent sent by the page tools; some news sites block others
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Name of the page content tool
pub const FETCH_URL_TOOL_NAME: &str = "fetch_url_content";

/// Name of the article extraction tool
pub const ARTICLE_TOOL_NAME: &str = "extract_article_content";

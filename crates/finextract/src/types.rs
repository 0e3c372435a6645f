//! Wire types for the chat completions protocol

use crate::config::SamplingParams;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single conversation message
///
/// Fields the endpoint sends that are not modelled here are kept in
/// `extra` so assistant messages are echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a text message with the given role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
            extra: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the message answering a tool call
    pub fn tool_result(role: Role, tool_call_id: impl Into<String>, content: String) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(role, content)
        }
    }

    /// Tool calls requested by this message (empty if none)
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// True if the message carries at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Text content, empty when the endpoint sent null
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A model-issued request to run a local function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a function tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(
        default = "default_arguments",
        deserialize_with = "deserialize_arguments"
    )]
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

fn default_arguments() -> String {
    "{}".to_string()
}

/// Some endpoints send arguments as an object instead of encoded text
fn deserialize_arguments<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => default_arguments(),
        other => other.to_string(),
    })
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

impl ToolSpec {
    /// Create a function tool spec
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool selection policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// Request body for the chat completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl CompletionRequest {
    /// Create a request with no tools and no sampling parameters
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Advertise tools with the given selection policy
    pub fn with_tools(mut self, tools: Vec<ToolSpec>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = Some(choice);
        self
    }

    /// Set all sampling parameters
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.max_tokens = Some(sampling.max_tokens);
        self.temperature = Some(sampling.temperature);
        self.top_p = Some(sampling.top_p);
        self
    }

    /// Effective sampling parameters, filling omitted ones with defaults
    pub fn sampling(&self) -> SamplingParams {
        let defaults = SamplingParams::default();
        SamplingParams {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
        }
    }

    /// Build the follow-up request for the next turn
    ///
    /// Keeps the model and sampling parameters; tool specs are not resent.
    pub fn continuation(&self, messages: Vec<Message>) -> Self {
        Self::new(self.model.clone(), messages).with_sampling(self.sampling())
    }
}

/// One alternative answer in a completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    pub message: Message,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// `logprobs` and other provider fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response body of the chat completions endpoint
///
/// `error` and `response_body` are set when the endpoint embeds an
/// application-level failure in an otherwise successful response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionResponse {
    /// Response with a single choice holding `message`
    pub fn from_message(message: Message) -> Self {
        Self {
            choices: vec![Choice {
                index: Some(0),
                message,
                finish_reason: None,
                extra: Map::new(),
            }],
            ..Default::default()
        }
    }

    /// Message of the first choice; other choices are ignored
    pub fn first_message(&self) -> Option<&Message> {
        self.choices.first().map(|choice| &choice.message)
    }

    /// Embedded error text, if the endpoint reported one
    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|error| match error {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                _ => error.to_string(),
            },
            other => other.to_string(),
        })
    }
}

/// Body captured from a failed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    /// Body decoded as JSON
    Json(Value),
    /// Body that is not JSON, kept verbatim
    Text(String),
}

impl ErrorBody {
    /// Decode `raw` as JSON, falling back to the raw text
    pub fn from_text(raw: &str) -> Self {
        serde_json::from_str(raw)
            .map(ErrorBody::Json)
            .unwrap_or_else(|_| ErrorBody::Text(raw.to_string()))
    }

    /// Pretty-printed JSON rendering (text bodies become a JSON string)
    pub fn to_pretty(&self) -> String {
        let result = match self {
            ErrorBody::Json(value) => serde_json::to_string_pretty(value),
            ErrorBody::Text(text) => serde_json::to_string_pretty(text),
        };
        result.unwrap_or_default()
    }
}

/// Outcome of a tool invocation: exactly one of content or error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Content(String),
    Error(String),
}

impl ToolResult {
    pub fn content(&self) -> Option<&str> {
        match self {
            ToolResult::Content(content) => Some(content),
            ToolResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolResult::Content(_) => None,
            ToolResult::Error(error) => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// Text placed in the tool-result message
    pub fn into_message_content(self) -> String {
        match self {
            ToolResult::Content(content) => content,
            ToolResult::Error(error) => format!("Error: {}", error),
        }
    }
}

/// Response of the models endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

/// A model offered by the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

impl ModelInfo {
    /// Short name for display: `provider::version::name` becomes `provider - name`
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = self.id.split("::").collect();
        match (parts.first(), parts.last()) {
            (Some(first), Some(last)) if parts.len() >= 3 => format!("{} - {}", first, last),
            _ => self.id.clone(),
        }
    }

    pub fn provider(&self) -> &str {
        self.owned_by.as_deref().unwrap_or("Unknown Provider")
    }
}

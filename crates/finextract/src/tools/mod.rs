//! Tools the model may call during a conversation
//!
//! Design: each tool declares a name, a description and a JSON Schema for
//! its arguments. [`ToolRegistry`] advertises the specs to the model and
//! dispatches tool calls by name. A dispatch never fails: unknown names,
//! bad arguments, tool errors and panics all come back as
//! [`ToolResult::Error`] so the conversation can carry on.

mod article;
pub mod convert;
mod fetch_url;

pub use article::ArticleTool;
pub use fetch_url::{FetchUrlArgs, FetchUrlTool, FetchUrlToolBuilder};

use crate::error::ToolError;
use crate::types::{ToolCall, ToolResult, ToolSpec};
use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// A function the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema of the argument object
    fn parameters(&self) -> Value;

    /// Run the tool
    ///
    /// `args` is the decoded argument object. Returned text becomes the
    /// tool-result message; an error becomes an `Error: ...` message.
    async fn call(&self, args: Map<String, Value>) -> Result<String, ToolError>;

    /// Spec advertised in the completion request
    fn spec(&self) -> ToolSpec {
        ToolSpec::function(self.name(), self.description(), self.parameters())
    }
}

/// Decode tool arguments into a typed struct
pub fn parse_args<T: DeserializeOwned>(
    tool: &str,
    args: Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

type ToolFn = dyn Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync;

/// Tool backed by a synchronous closure
///
/// Handy for small local functions that need no I/O.
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        (self.func)(args)
    }
}

/// Named tools available to the conversation driver
///
/// Tools keep their registration order, which is the order their specs
/// are advertised in. Registering a second tool under an existing name
/// replaces the first.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry holding the page content tool
    ///
    /// The article tool is opt-in; see [`ToolRegistry::with_article_tool`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FetchUrlTool::default()));
        registry
    }

    /// Also register the article extraction tool
    pub fn with_article_tool(mut self) -> Self {
        self.register(Box::new(ArticleTool::default()));
        self
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(pos) => self.tools[pos] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Specs for every registered tool
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Run the tool named by `call`
    ///
    /// Empty arguments count as `{}`. Anything that goes wrong is folded
    /// into [`ToolResult::Error`].
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let name = call.name();
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Model requested an unregistered tool");
            return ToolResult::Error(ToolError::UnknownTool(name.to_string()).to_string());
        };

        let args = match decode_arguments(name, call.arguments()) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = name, error = %e, "Rejected tool arguments");
                return ToolResult::Error(e.to_string());
            }
        };

        debug!(tool = name, call_id = %call.id, "Running tool");
        match AssertUnwindSafe(tool.call(args)).catch_unwind().await {
            Ok(Ok(content)) => ToolResult::Content(content),
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolResult::Error(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = name, error = %message, "Tool panicked");
                ToolResult::Error(message)
            }
        }
    }
}

fn decode_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("expected a JSON object, got {}", other),
        }),
        Err(e) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Tool panicked".to_string()
    }
}

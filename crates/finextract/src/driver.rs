//! Tool-calling conversation driver
//!
//! Runs the request/response loop against the completion endpoint:
//! send the request, run every tool call in the returned message, append
//! one result message per call, send the grown conversation back, and stop
//! once the model answers without tool calls.
//!
//! The conversation is append-only and lives only for one [`run`]. Tool
//! failures stay inside the conversation as `Error: ...` messages; a
//! transport failure ends the run and drops the partial conversation.
//!
//! [`run`]: ConversationDriver::run

use crate::error::DriverError;
use crate::tools::ToolRegistry;
use crate::transport::CompletionTransport;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, ToolCall, ToolResult};
use tracing::{debug, info, warn};

/// Default limit on tool turns per conversation
pub const DEFAULT_MAX_TURNS: usize = 10;

/// What to do with a tool call naming a tool that is not registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownToolPolicy {
    /// Append no message for the call
    Skip,
    /// Append an `Error: Unknown tool: <name>` result message
    #[default]
    Report,
}

/// Drives one tool-calling conversation per [`run`](Self::run)
pub struct ConversationDriver<T> {
    transport: T,
    registry: ToolRegistry,
    max_turns: usize,
    unknown_tools: UnknownToolPolicy,
    tool_role: Role,
}

impl<T: CompletionTransport> ConversationDriver<T> {
    pub fn new(transport: T, registry: ToolRegistry) -> Self {
        Self {
            transport,
            registry,
            max_turns: DEFAULT_MAX_TURNS,
            unknown_tools: UnknownToolPolicy::default(),
            tool_role: Role::Tool,
        }
    }

    /// Limit the number of tool turns before giving up
    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn unknown_tools(mut self, policy: UnknownToolPolicy) -> Self {
        self.unknown_tools = policy;
        self
    }

    /// Role of tool-result messages, for endpoints without a `tool` role
    pub fn tool_role(mut self, role: Role) -> Self {
        self.tool_role = role;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the conversation until the model stops calling tools
    ///
    /// Returns the last response verbatim. A response that carries an
    /// embedded `error` ends the loop and is returned as well, so the
    /// caller can report it.
    pub async fn run(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, DriverError> {
        info!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Starting conversation"
        );
        let mut response = self.transport.send(&request).await?;
        let mut messages = request.messages.clone();
        let mut turns = 0;

        loop {
            if let Some(error) = response.error_text() {
                warn!(turn = turns, error = %error, "Completion response carried an error");
                return Ok(response);
            }

            let Some(message) = response.first_message().cloned() else {
                return Err(DriverError::EmptyChoices {
                    response: Box::new(response),
                });
            };

            if !message.has_tool_calls() {
                info!(turns, messages = messages.len() + 1, "Conversation finished");
                return Ok(response);
            }

            if turns >= self.max_turns {
                warn!(turns, "Turn limit reached with tool calls pending");
                return Err(DriverError::MaxTurnsExceeded {
                    turns,
                    last_response: Box::new(response),
                });
            }
            turns += 1;

            let calls = message.tool_calls().to_vec();
            info!(turn = turns, calls = calls.len(), "Model requested tools");
            messages.push(message);

            for call in &calls {
                if let Some(result) = self.run_tool(turns, call).await {
                    messages.push(result);
                }
            }

            let next = request.continuation(messages);
            debug!(
                turn = turns,
                messages = next.messages.len(),
                "Sending continuation"
            );
            response = self.transport.send(&next).await?;
            messages = next.messages;
        }
    }

    /// Result message for one call, or `None` when the call is skipped
    async fn run_tool(&self, turn: usize, call: &ToolCall) -> Option<Message> {
        if !self.registry.contains(call.name()) && self.unknown_tools == UnknownToolPolicy::Skip {
            warn!(turn, tool = call.name(), call_id = %call.id, "Skipping unregistered tool");
            return None;
        }

        let result = self.registry.dispatch(call).await;
        match &result {
            ToolResult::Content(content) => debug!(
                turn,
                tool = call.name(),
                call_id = %call.id,
                chars = content.chars().count(),
                "Tool returned content"
            ),
            ToolResult::Error(error) => warn!(
                turn,
                tool = call.name(),
                call_id = %call.id,
                error = %error,
                "Tool returned an error"
            ),
        }

        Some(Message::tool_result(
            self.tool_role,
            call.id.clone(),
            result.into_message_content(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ToolError, TransportError};
    use crate::tools::FnTool;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records every request
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<CompletionResponse, TransportError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<CompletionResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn send(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(final_answer("script exhausted")))
        }
    }

    fn final_answer(text: &str) -> CompletionResponse {
        CompletionResponse::from_message(Message::assistant(text))
    }

    fn tool_calls(calls: Vec<ToolCall>) -> CompletionResponse {
        CompletionResponse::from_message(Message {
            tool_calls: Some(calls),
            content: None,
            ..Message::assistant("")
        })
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FnTool::new(
            "lookup",
            "Look up a page",
            json!({"type": "object"}),
            |args| match args.get("url").and_then(|v| v.as_str()) {
                Some(url) => Ok(format!("content of {}", url)),
                None => Err(ToolError::Execution("missing url".to_string())),
            },
        )));
        registry.register(Box::new(FnTool::new(
            "explode",
            "Panics",
            json!({"type": "object"}),
            |_| panic!("handler crashed"),
        )));
        registry
    }

    fn initial_request() -> CompletionRequest {
        CompletionRequest::new(
            "test-model",
            vec![Message::system("sys"), Message::user("extract")],
        )
        .with_tools(registry().specs(), crate::types::ToolChoice::Auto)
    }

    #[tokio::test]
    async fn test_no_tool_calls_returns_first_response() {
        let response = CompletionResponse {
            extra: json!({"id": "resp-1", "usage": {"total_tokens": 12}})
                .as_object()
                .cloned()
                .unwrap(),
            ..final_answer("Company name: Apple Inc.")
        };
        let transport = ScriptedTransport::new(vec![Ok(response.clone())]);
        let driver = ConversationDriver::new(transport, registry());

        let result = driver.run(initial_request()).await.unwrap();
        assert_eq!(result, response);

        let requests = driver.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], initial_request());
    }

    #[tokio::test]
    async fn test_tool_results_appended_in_order() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![
                ToolCall::new("c1", "lookup", r#"{"url":"https://a.example"}"#),
                ToolCall::new("c2", "lookup", r#"{"url":"https://b.example"}"#),
            ])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());

        let result = driver.run(initial_request()).await.unwrap();
        assert_eq!(result.first_message().unwrap().text(), "done");

        let requests = driver.transport().requests();
        assert_eq!(requests.len(), 2);
        let messages = &requests[1].messages;
        assert_eq!(messages.len(), requests[0].messages.len() + 1 + 2);
        assert_eq!(messages[..2], requests[0].messages[..]);
        assert!(messages[2].has_tool_calls());
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[3].text(), "content of https://a.example");
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(messages[4].text(), "content of https://b.example");
    }

    #[tokio::test]
    async fn test_continuation_keeps_model_and_sampling() {
        let request = initial_request().with_sampling(crate::config::SamplingParams {
            max_tokens: 500,
            temperature: 0.1,
            top_p: 0.5,
        });
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"url":"u"}"#)])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        driver.run(request).await.unwrap();

        let next = &driver.transport().requests()[1];
        assert_eq!(next.model, "test-model");
        assert_eq!(next.max_tokens, Some(500));
        assert_eq!(next.temperature, Some(0.1));
        assert_eq!(next.top_p, Some(0.5));
        assert!(next.tools.is_empty());
    }

    #[tokio::test]
    async fn test_continuation_falls_back_to_default_sampling() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"url":"u"}"#)])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        driver.run(initial_request()).await.unwrap();

        let next = &driver.transport().requests()[1];
        assert_eq!(next.max_tokens, Some(1000));
        assert_eq!(next.temperature, Some(0.3));
        assert_eq!(next.top_p, Some(0.95));
    }

    #[tokio::test]
    async fn test_unregistered_tool_skipped() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "missing_tool", "{}")])),
            Ok(final_answer("done")),
        ]);
        let driver =
            ConversationDriver::new(transport, registry()).unknown_tools(UnknownToolPolicy::Skip);
        driver.run(initial_request()).await.unwrap();

        let requests = driver.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), requests[0].messages.len() + 1);
        assert!(requests[1]
            .messages
            .iter()
            .all(|m| m.tool_call_id.is_none()));
    }

    #[tokio::test]
    async fn test_unregistered_tool_reported_by_default() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "missing_tool", "{}")])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        driver.run(initial_request()).await.unwrap();

        let last = driver.transport().requests()[1].messages.last().cloned().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(last.text(), "Error: Unknown tool: missing_tool");
    }

    #[tokio::test]
    async fn test_tool_failures_become_error_messages() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![
                ToolCall::new("c1", "lookup", "{}"),
                ToolCall::new("c2", "explode", "{}"),
                ToolCall::new("c3", "lookup", "{not json"),
            ])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        let result = driver.run(initial_request()).await.unwrap();
        assert_eq!(result.first_message().unwrap().text(), "done");

        let messages = &driver.transport().requests()[1].messages;
        let tool_messages: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(tool_messages.len(), 3);
        assert_eq!(tool_messages[0].text(), "Error: missing url");
        assert_eq!(tool_messages[1].text(), "Error: handler crashed");
        assert!(tool_messages[2]
            .text()
            .starts_with("Error: Invalid arguments for lookup"));
    }

    #[tokio::test]
    async fn test_assistant_tool_role() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"url":"u"}"#)])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry()).tool_role(Role::Assistant);
        driver.run(initial_request()).await.unwrap();

        let last = driver.transport().requests()[1].messages.last().cloned().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_multiple_turns_grow_conversation() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"url":"a"}"#)])),
            Ok(tool_calls(vec![
                ToolCall::new("c2", "lookup", r#"{"url":"b"}"#),
                ToolCall::new("c3", "lookup", r#"{"url":"c"}"#),
            ])),
            Ok(final_answer("done")),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        driver.run(initial_request()).await.unwrap();

        let lengths: Vec<_> = driver
            .transport()
            .requests()
            .iter()
            .map(|r| r.messages.len())
            .collect();
        assert_eq!(lengths, vec![2, 4, 7]);
    }

    #[tokio::test]
    async fn test_transport_error_aborts() {
        let transport = ScriptedTransport::new(vec![
            Ok(tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"url":"a"}"#)])),
            Err(TransportError::Status {
                status: StatusCode::BAD_GATEWAY,
                url: "https://llm.example.com/chat".to_string(),
                body: Some(crate::types::ErrorBody::Text("upstream down".to_string())),
            }),
        ]);
        let driver = ConversationDriver::new(transport, registry());
        let err = driver.run(initial_request()).await.unwrap_err();

        assert!(matches!(
            err,
            DriverError::Transport(TransportError::Status { .. })
        ));
        assert_eq!(
            err.body(),
            Some(crate::types::ErrorBody::Text("upstream down".to_string()))
        );
        assert_eq!(driver.transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let looping: Vec<_> = (0..5)
            .map(|i| {
                Ok(tool_calls(vec![ToolCall::new(
                    format!("c{}", i),
                    "lookup",
                    r#"{"url":"a"}"#,
                )]))
            })
            .collect();
        let transport = ScriptedTransport::new(looping);
        let driver = ConversationDriver::new(transport, registry()).max_turns(2);
        let err = driver.run(initial_request()).await.unwrap_err();

        match err {
            DriverError::MaxTurnsExceeded { turns, .. } => assert_eq!(turns, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.transport().requests().len(), 3);
    }

    #[tokio::test]
    async fn test_embedded_error_returned() {
        let response: CompletionResponse =
            serde_json::from_value(json!({"error": "timeout", "response_body": {"detail": "x"}}))
                .unwrap();
        let transport = ScriptedTransport::new(vec![Ok(response.clone())]);
        let driver = ConversationDriver::new(transport, registry());

        let result = driver.run(initial_request()).await.unwrap();
        assert_eq!(result, response);
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let transport = ScriptedTransport::new(vec![Ok(CompletionResponse::default())]);
        let driver = ConversationDriver::new(transport, registry());
        let err = driver.run(initial_request()).await.unwrap_err();
        assert!(matches!(err, DriverError::EmptyChoices { .. }));
    }
}

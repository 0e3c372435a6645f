//! Prompts and the initial extraction request

use crate::config::SamplingParams;
use crate::tools::ToolRegistry;
use crate::types::{CompletionRequest, Message, ToolChoice};
use crate::FETCH_URL_TOOL_NAME;

/// Instruction placed first in every extraction conversation
pub const SYSTEM_PROMPT: &str = "You are a financial data extraction assistant. Extract the requested financial information from the provided URL accurately. Use the fetch_url_content tool to access the content of the URL. Only use information explicitly stated in the article.";

/// User instruction asking for the five fields as `Label: value` lines
pub fn create_prompt(url: &str) -> String {
    format!(
        "I need to extract financial data from this URL: {url}

First, please use the {FETCH_URL_TOOL_NAME} tool to get the content from the URL.

Then, extract the following information from the article:
- Company name
- Stock symbol
- Revenue
- Net income
- EPS (Earnings Per Share)

Format your answer as:
- Company name: [Company Name]
- Stock symbol: [Stock Symbol]
- Revenue: [Revenue]
- Net income: [Net Income]
- EPS: [EPS]

If any information isn't available, indicate with \"Not found\". If you can't extract structured data at all, provide a brief summary of the article content."
    )
}

/// Initial request: system and user messages plus every registered tool
pub fn build_request(
    model: &str,
    url: &str,
    sampling: SamplingParams,
    registry: &ToolRegistry,
) -> CompletionRequest {
    let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(create_prompt(url))];
    let request = CompletionRequest::new(model, messages).with_sampling(sampling);
    if registry.is_empty() {
        request
    } else {
        request.with_tools(registry.specs(), ToolChoice::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_prompt_mentions_url_and_fields() {
        let prompt = create_prompt("https://news.example.com/apple-q1");
        assert!(prompt.starts_with(
            "I need to extract financial data from this URL: https://news.example.com/apple-q1"
        ));
        assert!(prompt.contains("fetch_url_content"));
        for label in ["Company name:", "Stock symbol:", "Revenue:", "Net income:", "EPS:"] {
            assert!(prompt.contains(label), "missing {label}");
        }
        assert!(prompt.contains("\"Not found\""));
    }

    #[test]
    fn test_build_request() {
        let registry = ToolRegistry::with_defaults();
        let request = build_request(
            "anthropic::2023-06-01::claude",
            "https://news.example.com/a",
            SamplingParams::default(),
            &registry,
        );

        assert_eq!(request.model, "anthropic::2023-06-01::claude");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].text(), SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].function.name, "fetch_url_content");
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.top_p, Some(0.95));
    }

    #[test]
    fn test_build_request_without_tools() {
        let request = build_request(
            "m",
            "https://news.example.com/a",
            SamplingParams::default(),
            &ToolRegistry::new(),
        );
        assert!(request.tools.is_empty());
        assert!(request.tool_choice.is_none());
    }
}

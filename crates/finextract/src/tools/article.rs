//! Article extraction tool

use super::convert::extract_article;
use super::fetch_url::{argument_schema, FetchUrlArgs, FetchUrlTool};
use super::{parse_args, Tool};
use crate::error::ToolError;
use crate::ARTICLE_TOOL_NAME;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{error, info};

const TOOL_DESCRIPTION: &str =
    "Extracts the title, meta description and main article text from a URL";

/// Returns `{title, meta_description, content}` for an article page
///
/// Shares fetching (headers, timeouts, prefix lists) with [`FetchUrlTool`].
#[derive(Debug, Clone, Default)]
pub struct ArticleTool {
    fetcher: FetchUrlTool,
}

impl ArticleTool {
    pub fn new(fetcher: FetchUrlTool) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for ArticleTool {
    fn name(&self) -> &str {
        ARTICLE_TOOL_NAME
    }

    fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    fn parameters(&self) -> Value {
        argument_schema::<FetchUrlArgs>()
    }

    async fn call(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: FetchUrlArgs = parse_args(self.name(), args)?;
        info!(url = %args.url, "Extracting article content");

        let page = self.fetcher.fetch_page(&args.url).await.map_err(|e| {
            let message = format!("Error extracting article content from {}: {}", args.url, e);
            error!("{}", message);
            ToolError::Execution(message)
        })?;

        let article = extract_article(&page.body);
        info!(
            url = %args.url,
            chars = article.content.chars().count(),
            "Extracted article content"
        );
        serde_json::to_string(&article).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec() {
        let spec = ArticleTool::default().spec();
        assert_eq!(spec.function.name, "extract_article_content");
        assert_eq!(spec.function.parameters["required"][0], "url");
    }

    #[tokio::test]
    async fn test_blocked_url_error() {
        let tool = ArticleTool::new(
            FetchUrlTool::builder()
                .allow_prefix("https://news.example.com")
                .build(),
        );
        let mut args = Map::new();
        args.insert(
            "url".to_string(),
            Value::String("https://evil.example.com".to_string()),
        );
        let err = tool.call(args).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error extracting article content from https://evil.example.com: Blocked URL: prefix not allowed"
        );
    }
}

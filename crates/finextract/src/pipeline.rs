//! URL in, report out
//!
//! Glues the pieces together: build the prompt, run the conversation, and
//! parse the final answer.

use crate::config::SamplingParams;
use crate::driver::ConversationDriver;
use crate::extract::{Extraction, FieldExtractor};
use crate::prompt::build_request;
use crate::transport::CompletionTransport;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Outcome of processing one URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub extraction: Extraction,
    /// Final response, or `{"error", "response_body"?}` when the run failed
    pub raw: Value,
}

/// Extracts financial facts from article URLs
pub struct FinancialExtractor<T> {
    driver: ConversationDriver<T>,
    extractor: FieldExtractor,
}

impl<T: CompletionTransport> FinancialExtractor<T> {
    pub fn new(driver: ConversationDriver<T>) -> Self {
        Self {
            driver,
            extractor: FieldExtractor::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn driver(&self) -> &ConversationDriver<T> {
        &self.driver
    }

    /// Run one extraction for `url` with `model`
    pub async fn process(&self, url: &str, model: &str, sampling: SamplingParams) -> Report {
        info!(url = %url, model = %model, "Processing URL");
        let request = build_request(model, url, sampling, self.driver.registry());
        let result = self.driver.run(request).await;
        let extraction = self.extractor.parse_result(&result);

        let raw = match &result {
            Ok(response) => serde_json::to_value(response).unwrap_or(Value::Null),
            Err(e) => e.report(),
        };

        Report { extraction, raw }
    }
}

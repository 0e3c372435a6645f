//! Field extraction from the model's final answer
//!
//! The model is asked to answer with `Label: value` lines. Each field has
//! a case-insensitive pattern capturing the rest of its line; placeholder
//! values such as `Not found` are dropped. When too few fields survive,
//! the whole answer is kept as a prose summary instead.

use crate::error::DriverError;
use crate::types::{CompletionResponse, ErrorBody};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Field key to extracted value
pub type ExtractedFields = BTreeMap<String, String>;

/// Default field keys and the labels they are matched by
pub const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("company name", "Company name"),
    ("stock symbol", "Stock symbol"),
    ("revenue", "Revenue"),
    ("net income", "Net income"),
    ("EPS", "EPS"),
];

/// Captured values treated as missing
pub const DEFAULT_BLOCKLIST: &[&str] = &["Not found", "N/A", "Unknown"];

/// Minimum matched fields for a structured result
pub const DEFAULT_MIN_DATA_POINTS: usize = 3;

/// Result of parsing a final answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    /// Enough fields were found
    Fields { fields: ExtractedFields },
    /// Too few fields; the answer text is kept as a summary
    Summary { summary: String },
    /// The request failed or the endpoint reported an error
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_body: Option<ErrorBody>,
    },
}

impl Extraction {
    pub fn fields(&self) -> Option<&ExtractedFields> {
        match self {
            Extraction::Fields { fields } => Some(fields),
            _ => None,
        }
    }

    /// Summary or formatted error text; `None` for a structured result
    pub fn error_or_summary(&self) -> Option<String> {
        match self {
            Extraction::Fields { .. } => None,
            Extraction::Summary { summary } => Some(summary.clone()),
            Extraction::Error {
                error,
                response_body,
            } => Some(format_api_error(error, response_body.as_ref())),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Extraction::Error { .. })
    }
}

/// Render an error as `API Error: <message>` plus the pretty-printed body
pub fn format_api_error(message: &str, body: Option<&ErrorBody>) -> String {
    let mut text = format!("API Error: {}", message);
    if let Some(body) = body {
        text.push_str("\n\nResponse Body: ");
        text.push_str(&body.to_pretty());
    }
    text
}

/// A field key and its compiled pattern
#[derive(Debug, Clone)]
struct FieldPattern {
    key: String,
    regex: Regex,
}

/// Pulls labeled fields out of answer text
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    patterns: Vec<FieldPattern>,
    blocklist: Vec<String>,
    min_data_points: usize,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        let patterns = DEFAULT_FIELDS
            .iter()
            .filter_map(|(key, label)| {
                Regex::new(&label_pattern(label))
                    .ok()
                    .map(|regex| FieldPattern {
                        key: key.to_string(),
                        regex,
                    })
            })
            .collect();

        Self {
            patterns,
            blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
            min_data_points: DEFAULT_MIN_DATA_POINTS,
        }
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the field set with custom `(key, regex)` pairs
    ///
    /// Each regex must have one capture group holding the value.
    pub fn with_patterns<I, K, P>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        self.patterns = patterns
            .into_iter()
            .map(|(key, pattern)| {
                Regex::new(pattern.as_ref()).map(|regex| FieldPattern {
                    key: key.into(),
                    regex,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_min_data_points(mut self, min_data_points: usize) -> Self {
        self.min_data_points = min_data_points;
        self
    }

    pub fn with_blocklist<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocklist = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_data_points(&self) -> usize {
        self.min_data_points
    }

    /// Field keys in declaration order
    pub fn keys(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.key.as_str()).collect()
    }

    /// Match every pattern against `content`
    pub fn extract_fields(&self, content: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        for pattern in &self.patterns {
            let Some(value) = pattern
                .regex
                .captures(content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
            else {
                continue;
            };
            if self.blocklist.iter().any(|blocked| blocked == value) {
                continue;
            }
            fields.insert(pattern.key.clone(), value.to_string());
        }
        fields
    }

    /// Turn a final completion response into fields, a summary or an error
    pub fn parse_response(&self, response: &CompletionResponse) -> Extraction {
        if let Some(error) = response.error_text() {
            return Extraction::Error {
                error,
                response_body: response.response_body.clone().map(ErrorBody::Json),
            };
        }

        let content = response
            .first_message()
            .map(|message| message.text())
            .unwrap_or_default();
        debug!(chars = content.chars().count(), "Parsing answer");

        let fields = self.extract_fields(content);
        if fields.len() >= self.min_data_points {
            info!(fields = fields.len(), "Extracted structured fields");
            Extraction::Fields { fields }
        } else {
            info!(
                fields = fields.len(),
                required = self.min_data_points,
                "Too few fields, keeping answer as summary"
            );
            Extraction::Summary {
                summary: content.to_string(),
            }
        }
    }

    /// Like [`parse_response`](Self::parse_response), also covering failed runs
    pub fn parse_result(&self, result: &Result<CompletionResponse, DriverError>) -> Extraction {
        match result {
            Ok(response) => self.parse_response(response),
            Err(e) => Extraction::Error {
                error: e.to_string(),
                response_body: e.body(),
            },
        }
    }
}

fn label_pattern(label: &str) -> String {
    format!(r"(?i){}:?\s*(.+?)(?:\n|$)", regex::escape(label))
}

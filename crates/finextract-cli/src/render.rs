//! Text and JSON rendering of CLI results

use finextract::{Extraction, ModelInfo, Report, ToolRegistry};
use serde_json::Value;

/// Table rows: display label and field key
const FIELD_ROWS: &[(&str, &str)] = &[
    ("Company Name", "company name"),
    ("Stock Symbol", "stock symbol"),
    ("Revenue", "revenue"),
    ("Net Income", "net income"),
    ("EPS", "EPS"),
];

const MISSING: &str = "N/A";

const SUMMARY_NOTICE: &str =
    "Unable to extract structured financial data. Here's a summary instead:\n\n";

/// One line per model: display name, provider, full id
pub fn format_models(models: &[ModelInfo]) -> String {
    let width = models
        .iter()
        .map(|m| m.display_name().chars().count())
        .max()
        .unwrap_or(0);

    models
        .iter()
        .map(|m| {
            format!(
                "{:<width$}  {}  ({})",
                m.display_name(),
                m.provider(),
                m.id,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable report, optionally followed by the raw response
pub fn format_report_text(report: &Report, with_raw: bool) -> String {
    let mut output = String::new();

    match &report.extraction {
        Extraction::Fields { fields } => {
            output.push_str("Financial Data Extracted\n\n");
            let width = FIELD_ROWS.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
            for (label, key) in FIELD_ROWS {
                let value = fields.get(*key).map(String::as_str).unwrap_or(MISSING);
                output.push_str(&format!("  {:<width$}  {}\n", label, value, width = width));
            }
        }
        Extraction::Summary { summary } => {
            output.push_str("Content Summary\n\n");
            output.push_str(SUMMARY_NOTICE);
            output.push_str(summary.trim());
            output.push('\n');
        }
        Extraction::Error {
            error,
            response_body,
        } => {
            output.push_str("Error Processing Request\n\n");
            output.push_str(&format!("API Error: {}\n", error));
            if let Some(body) = response_body {
                output.push_str("\nAPI Response Details:\n");
                output.push_str(&body.to_pretty());
                output.push('\n');
            }
        }
    }

    if with_raw {
        output.push_str("\nRaw API Response:\n");
        output.push_str(&serde_json::to_string_pretty(&report.raw).unwrap_or_default());
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// `{status, fields|summary|error, response_body?, raw}`
pub fn report_json(report: &Report) -> Value {
    let mut value = serde_json::to_value(&report.extraction).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("raw".to_string(), report.raw.clone());
    }
    value
}

/// Pretty JSON array of the tool specs sent to the model
pub fn format_tools(registry: &ToolRegistry) -> String {
    serde_json::to_string_pretty(&registry.specs()).unwrap_or_default()
}

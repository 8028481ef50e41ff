//! Output formatting for CLI

use serde::Serialize;
use serde_json::Value;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format a report based on selected format
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> String {
    let value = serde_json::to_value(data).unwrap_or_default();
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Text => {
            let mut out = String::new();
            render_text(&value, 0, &mut out);
            out.trim_end().to_string()
        }
    }
}

/// Format one record of a stream on a single line
pub fn format_line<T: Serialize>(data: &T, format: OutputFormat) -> String {
    let value = serde_json::to_value(data).unwrap_or_default();
    match format {
        OutputFormat::Json => value.to_string(),
        OutputFormat::Text => match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| format!("{key}={}", scalar(value)))
                .collect::<Vec<_>>()
                .join(" "),
            other => scalar(&other),
        },
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn render_text(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(inner) if !inner.is_empty() => {
                        out.push_str(&format!("{pad}{key}:\n"));
                        render_text(value, indent + 1, out);
                    }
                    Value::Array(items) if !items.is_empty() => {
                        out.push_str(&format!("{pad}{key}:\n"));
                        for item in items {
                            out.push_str(&format!("{pad}  - {}\n", scalar(item)));
                        }
                    }
                    other => out.push_str(&format!("{pad}{key}: {}\n", scalar(other))),
                }
            }
        }
        other => out.push_str(&format!("{pad}{}\n", scalar(other))),
    }
}

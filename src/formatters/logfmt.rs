use crate::colors::ColorScheme;
use crate::formatters::RecordFormatter;
use serde_json::Value;

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "start", "finish", "banner_timestamp"];
const LEADING_KEYS: &[&str] = &["file", "status"];

/// Logfmt formatter with optional ANSI colors
pub struct LogfmtFormatter {
    colors: ColorScheme,
}

impl LogfmtFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self {
            colors: ColorScheme::new(use_colors),
        }
    }

    /// Flatten a record into `key=value` pairs. Nested objects and arrays get
    /// dotted keys (`properties.java.version`, `stack_trace.0`).
    pub fn pairs(&self, record: &Value) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        flatten_into(record, String::new(), &mut pairs);
        // stable: keeps record order within each rank
        pairs.sort_by_key(|(key, _)| {
            LEADING_KEYS
                .iter()
                .position(|k| k == key)
                .unwrap_or(LEADING_KEYS.len())
        });
        pairs
    }

    /// Format a single key=value pair with appropriate colors
    pub fn format_key_value_pair(&self, key: &str, value: &str) -> String {
        let colored_key = if self.colors.key.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.colors.key, key, self.colors.reset)
        };

        let equals = if self.colors.equals.is_empty() {
            "=".to_string()
        } else {
            format!("{}={}", self.colors.equals, self.colors.reset)
        };

        format!("{}{}{}", colored_key, equals, self.format_value(key, value))
    }

    fn format_value(&self, key: &str, value: &str) -> String {
        let color = match key {
            "level" => self.level_color(value),
            "status" if value == "success" => self.colors.success,
            "status" | "error" => self.colors.failure,
            k if TIMESTAMP_KEYS.contains(&k) => self.colors.timestamp,
            _ => self.colors.value,
        };

        let quoted_value = if needs_quoting(value) {
            format!("\"{}\"", escape(value))
        } else {
            value.to_string()
        };

        if color.is_empty() {
            quoted_value
        } else {
            format!("{}{}{}", color, quoted_value, self.colors.reset)
        }
    }

    fn level_color(&self, level: &str) -> &'static str {
        match level {
            "error" | "severe" | "fatal" => self.colors.level_error,
            "warning" => self.colors.level_warn,
            "info" | "config" => self.colors.level_info,
            "debug" | "fine" | "finer" | "finest" | "trace" => self.colors.level_debug,
            _ => "",
        }
    }
}

fn flatten_into(value: &Value, prefix: String, pairs: &mut Vec<(String, String)>) {
    let child = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                flatten_into(val, child(key), pairs);
            }
        }
        Value::Array(items) => {
            for (index, val) in items.iter().enumerate() {
                flatten_into(val, child(&index.to_string()), pairs);
            }
        }
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Null => pairs.push((prefix, String::new())),
        other => pairs.push((prefix, other.to_string())),
    }
}

/// Values with spaces, quotes, equals signs or control characters are quoted.
fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c == ' ' || c == '"' || c == '=' || c.is_control())
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl RecordFormatter for LogfmtFormatter {
    fn format_record(&self, record: &Value) -> String {
        self.pairs(record)
            .iter()
            .map(|(key, value)| self.format_key_value_pair(key, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

use serde_json::Value;

/// Trait for rendering one output record as a line of text
pub trait RecordFormatter {
    fn format_record(&self, record: &Value) -> String;
}

pub mod logfmt;

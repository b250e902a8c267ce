use crate::assembler::AssemblyStats;
use crate::coordinator::ParseOutcome;
use crate::error::OutputError;
use crate::event::RawEvent;
use crate::formatters::logfmt::LogfmtFormatter;
use crate::formatters::RecordFormatter;
use crate::tty::should_use_colors;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[value(name = "jsonl", help = "JSON Lines format (one JSON object per line)")]
    Jsonl,
    #[default]
    #[value(name = "logfmt", help = "Logfmt format (key=value pairs)")]
    Logfmt,
}

pub struct OutputFormatter {
    format: OutputFormat,
    logfmt: LogfmtFormatter,
}

impl OutputFormatter {
    /// `color_preference`: None = auto-detect, Some(true/false) = forced
    pub fn new(format: OutputFormat, color_preference: Option<bool>) -> Self {
        let use_colors = color_preference.unwrap_or_else(should_use_colors);
        OutputFormatter {
            format,
            logfmt: LogfmtFormatter::new(use_colors),
        }
    }

    pub fn write_record<W: Write>(&self, output: &mut W, record: &Value) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Jsonl => writeln!(output, "{}", serde_json::to_string(record)?)?,
            OutputFormat::Logfmt => writeln!(output, "{}", self.logfmt.format_record(record))?,
        }
        Ok(())
    }

    pub fn write_outcome<W: Write, T: Serialize>(
        &self,
        output: &mut W,
        outcome: &ParseOutcome<T>,
    ) -> Result<(), OutputError> {
        self.write_record(output, &outcome_record(outcome)?)
    }

    pub fn write_event<W: Write>(&self, output: &mut W, event: &RawEvent) -> Result<(), OutputError> {
        self.write_record(output, &serde_json::to_value(event)?)
    }

    pub fn write_unmatched<W: Write>(&self, output: &mut W, line: &str) -> Result<(), OutputError> {
        let mut record = Map::new();
        record.insert("unmatched".to_string(), Value::String(line.to_string()));
        self.write_record(output, &Value::Object(record))
    }

    pub fn write_stats<W: Write>(&self, output: &mut W, stats: &AssemblyStats) -> Result<(), OutputError> {
        self.write_record(output, &serde_json::to_value(stats)?)
    }
}

/// One flat object per outcome: `file`, `status`, then either the value's
/// own fields or `error`.
pub fn outcome_record<T: Serialize>(outcome: &ParseOutcome<T>) -> Result<Value, OutputError> {
    let mut record = Map::new();
    record.insert(
        "file".to_string(),
        Value::String(outcome.file().display().to_string()),
    );
    match outcome {
        ParseOutcome::Success { value, .. } => {
            record.insert("status".to_string(), Value::String("success".to_string()));
            match serde_json::to_value(value)? {
                Value::Object(fields) => {
                    for (key, field) in fields {
                        if key == "file" {
                            continue;
                        }
                        record.insert(key, field);
                    }
                }
                other => {
                    record.insert("value".to_string(), other);
                }
            }
        }
        ParseOutcome::Failure { error, .. } => {
            record.insert("status".to_string(), Value::String("failure".to_string()));
            record.insert("error".to_string(), Value::String(error.to_string()));
        }
    }
    Ok(Value::Object(record))
}

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::TimestampError;
use crate::timestamp::TimestampFormat;

/// Semantic field a layout can reference. Non-property keywords appear at
/// most once in a layout; `Property` may repeat with distinct names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKeyword {
    Timestamp,
    Logger,
    Level,
    Thread,
    Class,
    File,
    Line,
    Method,
    Message,
    Ndc,
    Property(String),
}

impl FieldKeyword {
    /// Keywords recognised as bare tokens in a layout, in match priority order.
    pub const TOKENS: [FieldKeyword; 10] = [
        FieldKeyword::Timestamp,
        FieldKeyword::Logger,
        FieldKeyword::Level,
        FieldKeyword::Thread,
        FieldKeyword::Class,
        FieldKeyword::File,
        FieldKeyword::Line,
        FieldKeyword::Method,
        FieldKeyword::Message,
        FieldKeyword::Ndc,
    ];

    pub fn token(&self) -> &str {
        match self {
            FieldKeyword::Timestamp => "TIMESTAMP",
            FieldKeyword::Logger => "LOGGER",
            FieldKeyword::Level => "LEVEL",
            FieldKeyword::Thread => "THREAD",
            FieldKeyword::Class => "CLASS",
            FieldKeyword::File => "FILE",
            FieldKeyword::Line => "LINE",
            FieldKeyword::Method => "METHOD",
            FieldKeyword::Message => "MESSAGE",
            FieldKeyword::Ndc => "NDC",
            FieldKeyword::Property(name) => name,
        }
    }
}

impl fmt::Display for FieldKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKeyword::Property(name) => write!(f, "PROP({})", name),
            other => f.write_str(other.token()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Finest,
    Finer,
    Fine,
    Debug,
    Config,
    Info,
    Warning,
    Error,
    Severe,
    Fatal,
}

impl Level {
    /// Case-insensitive lookup; `None` for text that is not a level name.
    pub fn parse(text: &str) -> Option<Level> {
        let level = match text.trim().to_ascii_lowercase().as_str() {
            "trace" => Level::Trace,
            "finest" => Level::Finest,
            "finer" => Level::Finer,
            "fine" => Level::Fine,
            "debug" => Level::Debug,
            "config" => Level::Config,
            "info" => Level::Info,
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            "severe" => Level::Severe,
            "fatal" => Level::Fatal,
            _ => return None,
        };
        Some(level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Finest => "finest",
            Level::Finer => "finer",
            Level::Fine => "fine",
            Level::Debug => "debug",
            Level::Config => "config",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Severe => "severe",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded value of one captured group.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Timestamp {
        local: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
    Level(Level),
    /// Text captured in the LEVEL slot that names no known level.
    UnknownLevel(String),
    Number(u32),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) | FieldValue::UnknownLevel(text) => Some(text),
            _ => None,
        }
    }
}

/// Decode captured text for `keyword`. Only timestamps can fail; a LINE
/// capture that is not a number is kept as text.
pub fn decode(
    keyword: &FieldKeyword,
    captured: &str,
    timestamps: &TimestampFormat,
) -> Result<FieldValue, TimestampError> {
    let value = match keyword {
        FieldKeyword::Timestamp => {
            let parsed = timestamps.parse(captured)?;
            FieldValue::Timestamp {
                local: parsed.local,
                offset: parsed.offset,
            }
        }
        FieldKeyword::Level => match Level::parse(captured) {
            Some(level) => FieldValue::Level(level),
            None => FieldValue::UnknownLevel(captured.to_string()),
        },
        FieldKeyword::Line => match captured.trim().parse::<u32>() {
            Ok(number) => FieldValue::Number(number),
            Err(_) => FieldValue::Text(captured.to_string()),
        },
        FieldKeyword::Logger
        | FieldKeyword::Thread
        | FieldKeyword::Class
        | FieldKeyword::File
        | FieldKeyword::Method
        | FieldKeyword::Message
        | FieldKeyword::Ndc
        | FieldKeyword::Property(_) => FieldValue::Text(captured.to_string()),
    };
    Ok(value)
}

pub const UNKNOWN_LOGGER: &str = "Unknown";

/// One assembled log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEvent {
    /// Wall-clock time as written in the file, without zone.
    pub timestamp: Option<NaiveDateTime>,
    /// Offset announced by the timestamp text, if any.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::serde_utils::serialize_offset"
    )]
    pub offset: Option<FixedOffset>,
    pub level: Level,
    pub logger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndc: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
}

impl RawEvent {
    /// Build an event from a non-empty field map plus the plain continuation
    /// lines and stack-trace lines gathered after its header.
    pub fn assemble(
        mut fields: IndexMap<FieldKeyword, FieldValue>,
        continuation: Vec<String>,
        stack_trace: Vec<String>,
    ) -> RawEvent {
        let mut message = match fields.shift_remove(&FieldKeyword::Message) {
            Some(FieldValue::Text(text)) => text,
            _ => String::new(),
        };

        let level = match fields.shift_remove(&FieldKeyword::Level) {
            Some(FieldValue::Level(level)) => level,
            Some(FieldValue::UnknownLevel(text)) if !text.is_empty() => {
                message = if message.is_empty() {
                    text
                } else {
                    format!("{} {}", text, message)
                };
                Level::Debug
            }
            _ => Level::Debug,
        };

        for line in continuation {
            message.push('\n');
            message.push_str(&line);
        }

        let (timestamp, offset) = match fields.shift_remove(&FieldKeyword::Timestamp) {
            Some(FieldValue::Timestamp { local, offset }) => (Some(local), offset),
            _ => (None, None),
        };

        let mut text = |keyword: FieldKeyword| {
            fields
                .shift_remove(&keyword)
                .and_then(|v| v.as_text().map(str::to_string))
        };
        let logger = text(FieldKeyword::Logger).unwrap_or_else(|| UNKNOWN_LOGGER.to_string());
        let thread = text(FieldKeyword::Thread);
        let class = text(FieldKeyword::Class);
        let file = text(FieldKeyword::File);
        let method = text(FieldKeyword::Method);
        let ndc = text(FieldKeyword::Ndc);

        // A LINE capture that is not a number is kept as a property
        let (line, unparsed_line) = match fields.shift_remove(&FieldKeyword::Line) {
            Some(FieldValue::Number(number)) => (Some(number), None),
            Some(FieldValue::Text(text)) if !text.trim().is_empty() => (None, Some(text)),
            _ => (None, None),
        };

        let mut properties: IndexMap<String, String> = fields
            .into_iter()
            .filter_map(|(keyword, value)| match (keyword, value) {
                (FieldKeyword::Property(name), FieldValue::Text(text)) => Some((name, text)),
                _ => None,
            })
            .collect();
        if let Some(text) = unparsed_line {
            properties
                .entry(FieldKeyword::Line.token().to_string())
                .or_insert(text);
        }

        RawEvent {
            timestamp,
            offset,
            level,
            logger,
            thread,
            class,
            file,
            line,
            method,
            ndc,
            message,
            stack_trace,
            properties,
        }
    }

    /// Point in time of this event, reading a zone-less timestamp in `default_zone`.
    pub fn instant(&self, default_zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let local = self.timestamp?;
        self.offset
            .unwrap_or(default_zone)
            .from_local_datetime(&local)
            .single()
    }
}

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PatternError;
use crate::event::{decode, FieldKeyword, FieldValue};
use crate::timestamp::TimestampFormat;

/// Start of a stack frame: indentation followed by `at `.
static STACK_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+at\s+\S").unwrap());

/// Frames that embed a URL come from license banners, not stack traces.
static URL_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9+.\-]*://").unwrap());

/// Characters escaped in layout literal text. `*` and spaces are translated
/// separately.
const LAYOUT_METACHARACTERS: &[char] = &[
    '[', ']', '^', '$', '.', '|', '?', '+', '(', ')', '{', '}', '-', '#', '\\',
];

const PROPERTY_OPEN: &str = "PROP(";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(FieldKeyword),
}

/// Executable line matcher compiled from a layout and a timestamp format.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    keywords: Vec<FieldKeyword>,
    timestamps: TimestampFormat,
    stack_frame: Regex,
    url_frame: Regex,
    terminator: Option<char>,
}

impl CompiledPattern {
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Keyword of each capture group, in group order.
    pub fn keywords(&self) -> &[FieldKeyword] {
        &self.keywords
    }

    pub fn timestamps(&self) -> &TimestampFormat {
        &self.timestamps
    }

    /// Literal character expected right before the final field, used to spot
    /// header lines whose final field was cut off.
    pub fn terminator(&self) -> Option<char> {
        self.terminator
    }

    /// Decode a header line into its field map. Returns `None` when the line
    /// does not match or its timestamp text does not fit the format.
    pub fn decode_line(&self, line: &str) -> Option<IndexMap<FieldKeyword, FieldValue>> {
        let captures = self.regex.captures(line)?;
        let mut fields = IndexMap::with_capacity(self.keywords.len());
        for (i, keyword) in self.keywords.iter().enumerate() {
            // Capture groups are 1-indexed (0 is the full match)
            let text = captures.get(i + 1).map(|m| m.as_str()).unwrap_or("");
            match decode(keyword, text, &self.timestamps) {
                Ok(value) => {
                    fields.insert(keyword.clone(), value);
                }
                Err(e) => {
                    tracing::trace!(error = %e, "header-shaped line rejected");
                    return None;
                }
            }
        }
        Some(fields)
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.decode_line(line).is_some()
    }

    pub fn is_stack_frame(&self, line: &str) -> bool {
        self.stack_frame.is_match(line) && !self.url_frame.is_match(line)
    }
}

/// Compile a layout such as `[LEVEL TIMESTAMP <THREAD> tid=PROP(tid)] MESSAGE`
/// with a timestamp format such as `yyyy/MM/dd HH:mm:ss.SSS z`.
///
/// Only a malformed timestamp format makes compilation fail.
pub fn compile(layout: &str, timestamp_format: &str) -> Result<CompiledPattern, PatternError> {
    let timestamps = TimestampFormat::new(timestamp_format)?;
    let segments = scan_layout(layout);

    let last_field = segments
        .iter()
        .rposition(|s| matches!(s, Segment::Field(_)));

    let mut pattern = String::from("^");
    let mut keywords = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => pattern.push_str(&escape_literal(text)),
            Segment::Field(keyword) => {
                let group = if Some(index) == last_field {
                    "(.*)".to_string()
                } else {
                    match keyword {
                        FieldKeyword::Timestamp => format!("({})", timestamps.line_pattern()),
                        FieldKeyword::Logger | FieldKeyword::Level => r"(\S+)".to_string(),
                        _ => "(.*?)".to_string(),
                    }
                };
                pattern.push_str(&group);
                keywords.push(keyword.clone());
            }
        }
    }
    pattern.push('$');

    let terminator = match (last_field, segments.last()) {
        (Some(last), Some(Segment::Field(_))) if last > 0 => match &segments[last - 1] {
            Segment::Literal(text) => text.trim_end().chars().last(),
            Segment::Field(_) => None,
        },
        _ => None,
    };

    let regex = Regex::new(&pattern)?;
    tracing::debug!(layout, regex = %regex, groups = keywords.len(), "compiled layout");

    Ok(CompiledPattern {
        regex,
        keywords,
        timestamps,
        stack_frame: STACK_FRAME.clone(),
        url_frame: URL_FRAME.clone(),
        terminator,
    })
}

/// Split a layout into literal text and field placeholders, left to right.
/// A bare keyword becomes a field only on its first occurrence.
fn scan_layout(layout: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut used: Vec<FieldKeyword> = Vec::new();
    let mut rest = layout;

    while let Some(ch) = rest.chars().next() {
        let boundary_before = !literal.chars().last().is_some_and(is_word_char);

        if let Some((name, consumed)) = property_at(rest) {
            flush_literal(&mut segments, &mut literal);
            segments.push(Segment::Field(FieldKeyword::Property(name)));
            rest = &rest[consumed..];
            continue;
        }

        if boundary_before {
            let keyword = FieldKeyword::TOKENS.iter().find(|k| {
                let token = k.token();
                !used.contains(k)
                    && rest.starts_with(token)
                    && !rest[token.len()..].chars().next().is_some_and(is_word_char)
            })
            .cloned();
            if let Some(keyword) = keyword {
                flush_literal(&mut segments, &mut literal);
                rest = &rest[keyword.token().len()..];
                used.push(keyword.clone());
                segments.push(Segment::Field(keyword));
                continue;
            }
        }

        literal.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    flush_literal(&mut segments, &mut literal);

    segments
}

fn property_at(text: &str) -> Option<(String, usize)> {
    let inner = text.strip_prefix(PROPERTY_OPEN)?;
    let close = inner.find(')')?;
    let name = inner[..close].trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), PROPERTY_OPEN.len() + close + 1))
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut in_spaces = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !in_spaces {
                out.push_str(" +");
            }
            in_spaces = true;
            continue;
        }
        in_spaces = false;
        match ch {
            '*' => out.push_str("(?:.*?)"),
            c if LAYOUT_METACHARACTERS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use chrono::{FixedOffset, NaiveDate};

    const GEODE_LAYOUT: &str = "[LEVEL TIMESTAMP <THREAD> tid=PROP(tid)] MESSAGE";
    const GEODE_TIMESTAMP: &str = "yyyy/MM/dd HH:mm:ss.SSS z";

    #[test]
    fn test_scan_layout() {
        let segments = scan_layout("TIMESTAMP [THREAD] LEVEL MESSAGE");
        assert_eq!(
            segments,
            vec![
                Segment::Field(FieldKeyword::Timestamp),
                Segment::Literal(" [".to_string()),
                Segment::Field(FieldKeyword::Thread),
                Segment::Literal("] ".to_string()),
                Segment::Field(FieldKeyword::Level),
                Segment::Literal(" ".to_string()),
                Segment::Field(FieldKeyword::Message),
            ]
        );
    }

    #[test]
    fn test_repeated_keyword_is_literal() {
        let segments = scan_layout("LEVEL LEVEL MESSAGE");
        assert_eq!(segments[1], Segment::Literal(" LEVEL ".to_string()));
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn test_keyword_inside_word_is_literal() {
        let segments = scan_layout("FILENAME: MESSAGE");
        assert_eq!(segments[0], Segment::Literal("FILENAME: ".to_string()));
        assert_eq!(segments[1], Segment::Field(FieldKeyword::Message));
    }

    #[test]
    fn test_compile_geode_layout() {
        let compiled = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
        assert_eq!(
            compiled.regex().as_str(),
            r"^\[(\S+) +(\S+/\S+/\S+ +\S+:\S+:\S+\.\S+ +\S+) +<(.*?)> +tid=(.*?)\] +(.*)$"
        );
        assert_eq!(
            compiled.keywords(),
            &[
                FieldKeyword::Level,
                FieldKeyword::Timestamp,
                FieldKeyword::Thread,
                FieldKeyword::Property("tid".to_string()),
                FieldKeyword::Message,
            ]
        );
        assert_eq!(compiled.terminator(), Some(']'));
    }

    #[test]
    fn test_group_count_matches_keywords() {
        let layouts = [
            GEODE_LAYOUT,
            "TIMESTAMP LEVEL [THREAD] LOGGER - MESSAGE",
            "* TIMESTAMP | LEVEL | CLASS.METHOD(FILE:LINE) | NDC | MESSAGE",
            "PROP(x) PROP(y) {TIMESTAMP} MESSAGE #end",
            "no fields at all",
        ];
        for layout in layouts {
            let compiled = compile(layout, GEODE_TIMESTAMP).unwrap();
            assert_eq!(
                compiled.regex().captures_len() - 1,
                compiled.keywords().len(),
                "layout {layout}"
            );
        }
    }

    #[test]
    fn test_decode_geode_line() {
        let compiled = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
        let fields = compiled
            .decode_line("[info 2019/03/12 10:20:30.123 PDT <Function Execution Processor1> tid=0x4f] Hello [world] - done")
            .unwrap();
        assert_eq!(fields[&FieldKeyword::Level], FieldValue::Level(Level::Info));
        assert_eq!(
            fields[&FieldKeyword::Thread],
            FieldValue::Text("Function Execution Processor1".to_string())
        );
        assert_eq!(
            fields[&FieldKeyword::Property("tid".to_string())],
            FieldValue::Text("0x4f".to_string())
        );
        assert_eq!(
            fields[&FieldKeyword::Message],
            FieldValue::Text("Hello [world] - done".to_string())
        );
        let expected = NaiveDate::from_ymd_opt(2019, 3, 12)
            .unwrap()
            .and_hms_milli_opt(10, 20, 30, 123)
            .unwrap();
        assert_eq!(
            fields[&FieldKeyword::Timestamp],
            FieldValue::Timestamp {
                local: expected,
                offset: FixedOffset::west_opt(7 * 3600)
            }
        );
    }

    #[test]
    fn test_padding_and_wildcard() {
        let compiled = compile("TIMESTAMP LEVEL * MESSAGE", "yyyy-MM-dd HH:mm:ss").unwrap();
        let lines = [
            "2024-01-15 10:00:00   WARN    [pool-1] Disk usage high",
            "2024-01-15 10:00:00 WARN [pool-1] Disk usage high",
        ];
        for line in lines {
            let fields = compiled.decode_line(line).unwrap();
            assert_eq!(fields[&FieldKeyword::Level], FieldValue::Level(Level::Warning));
            // the wildcard consumes exactly one token
            assert_eq!(
                fields[&FieldKeyword::Message],
                FieldValue::Text("Disk usage high".to_string()),
                "{line}"
            );
        }
    }

    #[test]
    fn test_unparseable_timestamp_is_not_a_match() {
        let compiled = compile("TIMESTAMP LEVEL MESSAGE", "yyyy-MM-dd HH:mm:ss").unwrap();
        assert!(compiled.decode_line("2024-13-45 99:00:00 INFO nope").is_none());
        assert!(compiled.is_match("2024-01-01 09:00:00 INFO yes"));
    }

    #[test]
    fn test_two_properties_do_not_collide() {
        let compiled = compile("PROP(x) PROP(y) MESSAGE", GEODE_TIMESTAMP).unwrap();
        let fields = compiled.decode_line("alpha beta the rest").unwrap();
        assert_eq!(
            fields[&FieldKeyword::Property("x".to_string())],
            FieldValue::Text("alpha".to_string())
        );
        assert_eq!(
            fields[&FieldKeyword::Property("y".to_string())],
            FieldValue::Text("beta".to_string())
        );
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_round_trip_generated_lines() {
        let compiled = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
        let cases = [
            ("info", 0, "main", "0x1", "Startup Configuration:"),
            ("warning", 3600, "P2P message reader for host(1)", "0x7a", "a] tricky [message"),
            ("severe", -5 * 3600, "Timer-0", "0xff", "x = y | z"),
        ];
        for (i, (level, offset, thread, tid, message)) in cases.iter().enumerate() {
            let local = NaiveDate::from_ymd_opt(2020, 2, 29)
                .unwrap()
                .and_hms_milli_opt(23, 59, i as u32, 5)
                .unwrap();
            let offset = FixedOffset::east_opt(*offset);
            let stamp = compiled.timestamps().format(&local, offset);
            let line = format!("[{} {} <{}> tid={}] {}", level, stamp, thread, tid, message);

            let fields = compiled.decode_line(&line).unwrap();
            assert_eq!(fields[&FieldKeyword::Level], FieldValue::Level(Level::parse(level).unwrap()));
            assert_eq!(fields[&FieldKeyword::Timestamp], FieldValue::Timestamp { local, offset });
            assert_eq!(fields[&FieldKeyword::Thread], FieldValue::Text(thread.to_string()));
            assert_eq!(
                fields[&FieldKeyword::Property("tid".to_string())],
                FieldValue::Text(tid.to_string())
            );
            assert_eq!(fields[&FieldKeyword::Message], FieldValue::Text(message.to_string()));
        }
    }

    #[test]
    fn test_stack_frames() {
        let compiled = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
        assert!(compiled.is_stack_frame("\tat org.apache.geode.Foo.bar(Foo.java:12)"));
        assert!(compiled.is_stack_frame("    at java.lang.Thread.run(Thread.java:748)"));
        assert!(!compiled.is_stack_frame("at column zero"));
        assert!(!compiled.is_stack_frame("  at http://www.apache.org/licenses/LICENSE-2.0"));
    }

    #[test]
    fn test_terminator_absent_when_layout_ends_in_literal() {
        let compiled = compile("<MESSAGE>", GEODE_TIMESTAMP).unwrap();
        assert_eq!(compiled.terminator(), None);
        let compiled = compile("MESSAGE", GEODE_TIMESTAMP).unwrap();
        assert_eq!(compiled.terminator(), None);
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        assert!(compile(GEODE_LAYOUT, "yyyy-MM-dd 'T").is_err());
        assert!(compile(GEODE_LAYOUT, "bogus").is_err());
    }
}

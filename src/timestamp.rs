use std::collections::HashMap;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PatternError, TimestampError};

/// Date/time symbol letters understood in a timestamp format.
/// Any other ASCII letter outside quotes makes the format malformed.
pub const SYMBOL_ALPHABET: &str = "GyYMLdDEuFwWaHkKhmsSzZX";

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Well-known zone abbreviations and their offsets in seconds east of UTC.
static ZONE_ABBREVIATIONS: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    const H: i32 = 3600;
    [
        ("UTC", 0),
        ("UT", 0),
        ("GMT", 0),
        ("Z", 0),
        ("ZULU", 0),
        ("WET", 0),
        ("WEST", H),
        ("BST", H),
        ("CET", H),
        ("CEST", 2 * H),
        ("MET", H),
        ("MEST", 2 * H),
        ("EET", 2 * H),
        ("EEST", 3 * H),
        ("MSK", 3 * H),
        ("IST", 5 * H + 1800),
        ("PKT", 5 * H),
        ("ICT", 7 * H),
        ("WIB", 7 * H),
        ("SGT", 8 * H),
        ("HKT", 8 * H),
        ("AWST", 8 * H),
        ("JST", 9 * H),
        ("KST", 9 * H),
        ("ACST", 9 * H + 1800),
        ("AEST", 10 * H),
        ("AEDT", 11 * H),
        ("NZST", 12 * H),
        ("NZDT", 13 * H),
        ("HST", -10 * H),
        ("AKST", -9 * H),
        ("AKDT", -8 * H),
        ("PST", -8 * H),
        ("PDT", -7 * H),
        ("MST", -7 * H),
        ("MDT", -6 * H),
        ("CST", -6 * H),
        ("CDT", -5 * H),
        ("EST", -5 * H),
        ("EDT", -4 * H),
        ("AST", -4 * H),
        ("ADT", -3 * H),
        ("NST", -3 * H - 1800),
        ("NDT", -2 * H - 1800),
        ("BRT", -3 * H),
        ("ART", -3 * H),
    ]
    .into_iter()
    .collect()
});

/// Resolve a zone abbreviation (`PDT`) or a `GMT+hh:mm` form to a fixed offset.
pub fn zone_offset(text: &str) -> Option<FixedOffset> {
    let upper = text.trim().to_ascii_uppercase();
    if let Some(seconds) = ZONE_ABBREVIATIONS.get(upper.as_str()) {
        return FixedOffset::east_opt(*seconds);
    }
    for prefix in ["GMT", "UTC", "UT"] {
        if let Some(rest) = upper.strip_prefix(prefix) {
            if rest.starts_with('+') || rest.starts_with('-') {
                return numeric_offset(rest);
            }
        }
    }
    None
}

/// Parse `Z`, `+hh`, `+hhmm`, `+hh:mm` (and `+h`) style offsets.
pub fn numeric_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" || text == "z" {
        return FixedOffset::east_opt(0);
    }
    let mut chars = text.chars();
    let sign = match chars.next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits: String = chars.filter(|c| *c != ':').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        3 => (digits[..1].parse::<i32>().ok()?, digits[1..].parse::<i32>().ok()?),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol { letter: char, width: usize },
    Literal(String),
}

/// A timestamp decoded from log text: the wall-clock reading plus the
/// offset it announced, if the format carries one and it could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

/// A compiled timestamp format such as `yyyy/MM/dd HH:mm:ss.SSS z`.
#[derive(Debug, Clone)]
pub struct TimestampFormat {
    source: String,
    tokens: Vec<Token>,
    parser: Regex,
}

impl TimestampFormat {
    pub fn new(format: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(format)?;
        let mut strict = String::from("^");
        for token in &tokens {
            match token {
                Token::Symbol { letter, width } => strict.push_str(&symbol_capture(*letter, *width)),
                Token::Literal(text) => strict.push_str(&escape_separators(text, r"\s+")),
            }
        }
        strict.push('$');

        Ok(TimestampFormat {
            source: format.to_string(),
            tokens,
            parser: Regex::new(&strict)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether decoded timestamps can carry their own offset.
    pub fn has_zone(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, Token::Symbol { letter: 'z' | 'Z' | 'X', .. }))
    }

    /// Loose sub-expression used inside a layout matcher: every symbol run
    /// becomes `\S+`, separators are escaped, spaces tolerate padding.
    pub fn line_pattern(&self) -> String {
        let mut pattern = String::new();
        for token in &self.tokens {
            match token {
                Token::Symbol { .. } => pattern.push_str(r"\S+"),
                Token::Literal(text) => pattern.push_str(&escape_separators(text, " +")),
            }
        }
        pattern
    }

    pub fn parse(&self, text: &str) -> Result<ParsedTimestamp, TimestampError> {
        let mismatch = || TimestampError::Mismatch {
            text: text.to_string(),
            format: self.source.clone(),
        };
        let captures = self.parser.captures(text.trim()).ok_or_else(mismatch)?;

        let mut year = 1970;
        let mut month = 1;
        let mut day = 1;
        let mut day_of_year = None;
        let mut hour = 0;
        let mut pm = None;
        let mut twelve_hour = false;
        let mut minute = 0;
        let mut second = 0;
        let mut nanos = 0;
        let mut offset = None;

        let symbols = self.tokens.iter().filter_map(|t| match t {
            Token::Symbol { letter, width } => Some((*letter, *width)),
            Token::Literal(_) => None,
        });
        for (index, (letter, width)) in symbols.enumerate() {
            let value = captures.get(index + 1).map(|m| m.as_str()).ok_or_else(mismatch)?;
            let number = || value.parse::<u32>().map_err(|_| mismatch());
            match letter {
                'y' | 'Y' => {
                    let parsed = number()? as i32;
                    year = if width == 2 {
                        if parsed < 70 { 2000 + parsed } else { 1900 + parsed }
                    } else {
                        parsed
                    };
                }
                'M' | 'L' if width <= 2 => month = number()?,
                'M' | 'L' => {
                    let prefix = value.get(..3).map(str::to_ascii_lowercase).ok_or_else(mismatch)?;
                    month = MONTHS
                        .iter()
                        .position(|m| *m == prefix)
                        .map(|p| p as u32 + 1)
                        .ok_or_else(mismatch)?;
                }
                'd' => day = number()?,
                'D' => day_of_year = Some(number()?),
                'H' => hour = number()?,
                'k' => hour = number()? % 24,
                'K' => {
                    hour = number()?;
                    twelve_hour = true;
                }
                'h' => {
                    hour = number()? % 12;
                    twelve_hour = true;
                }
                'a' => pm = Some(value.eq_ignore_ascii_case("pm")),
                'm' => minute = number()?,
                's' => second = number()?,
                'S' => nanos = fraction_to_nanos(value),
                'z' => offset = zone_offset(value),
                'Z' | 'X' => offset = Some(numeric_offset(value).ok_or_else(mismatch)?),
                _ => {}
            }
        }
        if twelve_hour && pm == Some(true) {
            hour += 12;
        }

        let out_of_range = || TimestampError::OutOfRange(text.to_string());
        let date = match day_of_year {
            Some(ordinal) if !self.has_month_and_day() => {
                NaiveDate::from_yo_opt(year, ordinal).ok_or_else(out_of_range)?
            }
            _ => NaiveDate::from_ymd_opt(year, month, day).ok_or_else(out_of_range)?,
        };
        let local = date
            .and_hms_nano_opt(hour, minute, second, nanos)
            .ok_or_else(out_of_range)?;

        Ok(ParsedTimestamp { local, offset })
    }

    /// Render a timestamp with this format. `z` renders `UTC` or `GMT+hh:mm`
    /// so that the output parses back to the same offset.
    pub fn format(&self, local: &NaiveDateTime, offset: Option<FixedOffset>) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Symbol { letter, width } => {
                    out.push_str(&render_symbol(*letter, *width, local, offset))
                }
            }
        }
        out
    }

    fn has_month_and_day(&self) -> bool {
        let has = |c: char| {
            self.tokens
                .iter()
                .any(|t| matches!(t, Token::Symbol { letter, .. } if *letter == c))
        };
        (has('M') || has('L')) && has('d')
    }
}

fn tokenize(format: &str) -> Result<Vec<Token>, PatternError> {
    if format.trim().is_empty() {
        return Err(PatternError::EmptyTimestampFormat);
    }

    fn push_literal(tokens: &mut Vec<Token>, text: &str) {
        if let Some(Token::Literal(last)) = tokens.last_mut() {
            last.push_str(text);
        } else {
            tokens.push(Token::Literal(text.to_string()));
        }
    }

    let mut tokens: Vec<Token> = Vec::new();

    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                push_literal(&mut tokens, "'");
                continue;
            }
            let mut quoted = String::new();
            let mut closed = false;
            while let Some(inner) = chars.next() {
                if inner == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        quoted.push('\'');
                        continue;
                    }
                    closed = true;
                    break;
                }
                quoted.push(inner);
            }
            if !closed {
                return Err(PatternError::UnterminatedQuote(format.to_string()));
            }
            push_literal(&mut tokens, &quoted);
        } else if ch.is_ascii_alphabetic() {
            if !SYMBOL_ALPHABET.contains(ch) {
                return Err(PatternError::UnknownSymbol {
                    symbol: ch,
                    format: format.to_string(),
                });
            }
            let mut width = 1;
            while chars.peek() == Some(&ch) {
                chars.next();
                width += 1;
            }
            tokens.push(Token::Symbol { letter: ch, width });
        } else {
            push_literal(&mut tokens, ch.encode_utf8(&mut [0; 4]));
        }
    }

    Ok(tokens)
}

/// Escape literal separator text, replacing each run of spaces with `spaces`.
fn escape_separators(text: &str, spaces: &str) -> String {
    let mut out = String::new();
    let mut in_spaces = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !in_spaces {
                out.push_str(spaces);
            }
            in_spaces = true;
            continue;
        }
        in_spaces = false;
        out.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
    }
    out
}

fn numeric_capture(width: usize, max: usize) -> String {
    if width >= 2 {
        format!(r"(\d{{{}}})", width.min(max.max(2)))
    } else {
        format!(r"(\d{{1,{}}})", max)
    }
}

fn symbol_capture(letter: char, width: usize) -> String {
    match letter {
        'y' | 'Y' if width >= 3 => r"(\d{4})".to_string(),
        'y' | 'Y' => numeric_capture(width, 4),
        'M' | 'L' if width == 3 => r"([A-Za-z]{3})".to_string(),
        'M' | 'L' if width > 3 => r"([A-Za-z]+)".to_string(),
        'M' | 'L' | 'd' | 'H' | 'k' | 'K' | 'h' | 'm' | 's' | 'w' | 'W' => numeric_capture(width, 2),
        'D' => numeric_capture(width, 3),
        'u' | 'F' => r"(\d)".to_string(),
        'S' if width == 1 => r"(\d+)".to_string(),
        'S' => format!(r"(\d{{{}}})", width),
        'E' | 'G' => r"([A-Za-z]+)".to_string(),
        'a' => r"([AaPp][Mm])".to_string(),
        'z' => r"([A-Za-z][A-Za-z_/]*(?:[+-]\d{1,2}(?::?\d{2})?)?)".to_string(),
        'Z' => r"(Z|[+-]\d{4})".to_string(),
        _ => r"(Z|[+-]\d{2}(?::?\d{2})?)".to_string(),
    }
}

fn fraction_to_nanos(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

fn render_symbol(letter: char, width: usize, local: &NaiveDateTime, offset: Option<FixedOffset>) -> String {
    let pad = |value: u32| format!("{:0width$}", value, width = width);
    match letter {
        'y' | 'Y' if width == 2 => format!("{:02}", local.year().rem_euclid(100)),
        'y' | 'Y' => format!("{:0width$}", local.year(), width = width),
        'M' | 'L' if width >= 4 => local.format("%B").to_string(),
        'M' | 'L' if width == 3 => local.format("%b").to_string(),
        'M' | 'L' => pad(local.month()),
        'd' => pad(local.day()),
        'D' => pad(local.ordinal()),
        'H' => pad(local.hour()),
        'k' => pad(if local.hour() == 0 { 24 } else { local.hour() }),
        'K' => pad(local.hour() % 12),
        'h' => pad(if local.hour() % 12 == 0 { 12 } else { local.hour() % 12 }),
        'a' => local.format("%p").to_string(),
        'm' => pad(local.minute()),
        's' => pad(local.second()),
        'S' => {
            let nanos = format!("{:09}", local.nanosecond() % 1_000_000_000);
            nanos[..width.min(9)].to_string()
        }
        'E' if width >= 4 => local.format("%A").to_string(),
        'E' => local.format("%a").to_string(),
        'u' => local.weekday().number_from_monday().to_string(),
        'F' => ((local.day() - 1) / 7 + 1).to_string(),
        'w' => pad(local.iso_week().week()),
        'W' => pad((local.day() - 1) / 7 + 1),
        'G' => "AD".to_string(),
        'z' => match offset {
            Some(o) if o.local_minus_utc() == 0 => "UTC".to_string(),
            Some(o) => format!("GMT{}", o),
            None => String::new(),
        },
        'Z' => offset
            .map(|o| o.to_string().replace(':', ""))
            .unwrap_or_default(),
        _ => offset.map(|o| o.to_string()).unwrap_or_default(),
    }
}

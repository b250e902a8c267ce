use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Empty timestamp format")]
    EmptyTimestampFormat,

    #[error("Illegal pattern character '{symbol}' in timestamp format '{format}'")]
    UnknownSymbol { symbol: char, format: String },

    #[error("Unterminated quote in timestamp format '{0}'")]
    UnterminatedQuote(String),

    #[error("Failed to compile layout expression: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimestampError {
    #[error("'{text}' does not match timestamp format '{format}'")]
    Mismatch { text: String, format: String },

    #[error("'{0}' is not a valid calendar date or time")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntervalError {
    #[error("Interval start is missing")]
    MissingStart,

    #[error("Interval finish is missing")]
    MissingFinish,

    #[error("Interval start {start} is after finish {finish}")]
    StartAfterFinish { start: String, finish: String },

    #[error("Interval endpoints carry different zones: {start} and {finish}")]
    ZoneMismatch { start: String, finish: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Log format not recognized in '{}'", .0.display())]
    FormatNotRecognized(PathBuf),

    #[error("Cannot read '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed under '{}': {message}", root.display())]
    TraversalFailure { root: PathBuf, message: String },

    #[error("Invalid interval in '{}': {source}", path.display())]
    Interval {
        path: PathBuf,
        #[source]
        source: IntervalError,
    },

    #[error("Worker for '{}' panicked", .0.display())]
    WorkerPanicked(PathBuf),
}

impl ParseError {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParseError::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParseError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown zone '{0}' (use an offset like +02:00 or an abbreviation like UTC)")]
    InvalidZone(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

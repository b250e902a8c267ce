use std::path::Path;

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

use crate::assembler::{AssemblerOptions, LineMode};
use crate::error::ConfigError;
use crate::metadata::default_banner_markers;
use crate::pattern_compiler::{compile, CompiledPattern};
use crate::timestamp::{numeric_offset, zone_offset};
use crate::walker::WalkOptions;

pub const DEFAULT_LAYOUT: &str = "[LEVEL TIMESTAMP <THREAD> tid=PROP(tid)] MESSAGE";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "yyyy/MM/dd HH:mm:ss.SSS z";

/// Configuration for parsing a log tree
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub layout: String,
    pub timestamp_format: String,
    /// Zone for timestamps that do not name one
    #[serde(deserialize_with = "crate::serde_utils::deserialize_zone")]
    pub default_zone: FixedOffset,
    /// Line mode for coverage scans
    pub line_mode: LineMode,
    /// Line mode for full metadata and event scans
    pub metadata_line_mode: LineMode,
    pub extension: String,
    pub recursive: bool,
    pub schedule: Schedule,
    pub max_workers: Option<usize>,
    /// Substrings marking the startup banner event
    pub banner_markers: Vec<String>,
    pub repair_exclusions: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            layout: DEFAULT_LAYOUT.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            default_zone: Utc.fix(),
            line_mode: LineMode::Isolate,
            // banner bodies are unclassified lines
            metadata_line_mode: LineMode::Append,
            extension: "log".to_string(),
            recursive: true,
            schedule: Schedule::Sequential,
            max_workers: None,
            banner_markers: default_banner_markers(),
            repair_exclusions: AssemblerOptions::default().repair_exclusions,
        }
    }
}

impl ParserConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn assembler_options(&self, mode: LineMode) -> AssemblerOptions {
        AssemblerOptions {
            mode,
            repair_exclusions: self.repair_exclusions.clone(),
        }
    }

    pub fn compile(&self) -> Result<CompiledPattern, ConfigError> {
        Ok(compile(&self.layout, &self.timestamp_format)?)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            extension: self.extension.clone(),
            recursive: self.recursive,
        }
    }
}

/// How files are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// One file at a time on the calling thread
    #[default]
    Sequential,
    /// One unit of work per file on a worker pool
    Parallel,
}

/// Parse `+02:00`, `-0500`, `Z`, `UTC`, `GMT+1` or a known abbreviation.
pub fn parse_zone(text: &str) -> Result<FixedOffset, ConfigError> {
    let trimmed = text.trim();
    numeric_offset(trimmed)
        .or_else(|| zone_offset(trimmed))
        .ok_or_else(|| ConfigError::InvalidZone(text.to_string()))
}

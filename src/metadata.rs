use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::event::RawEvent;
use crate::interval::Interval;

static VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Product-Version|(?:GemFire|Geode) Version)[ \t]*:[ \t]*(\S[^\r\n]*)$")
        .unwrap()
});

/// Host and CPU count come first; the operating system follows the last comma.
static OPERATING_SYSTEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Running on:[^\r\n]*,[ \t]*([^,\r\n]*[^,\s])[ \t]*\r?$").unwrap());

const PROPERTIES_BEGIN: &str = "System Properties:";

/// Headings that close the system properties section.
const SECTION_MARKERS: &[&str] = &[
    "Log4J 2 Configuration:",
    "Class Path:",
    "Library Path:",
    "Command Line Parameters:",
    "-----",
];

pub fn default_banner_markers() -> Vec<String> {
    vec![
        "Startup Configuration:".to_string(),
        "Licensed to the Apache Software Foundation".to_string(),
        "Product-Version:".to_string(),
    ]
}

/// Everything the startup banner says about a process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerDetails {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub zone: Option<FixedOffset>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub properties: Option<IndexMap<String, String>>,
}

/// Per-file result of a full metadata parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub file: PathBuf,
    pub coverage: Interval,
    /// Zone announced by the banner event, when there is one.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::serde_utils::serialize_offset"
    )]
    pub zone: Option<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::serde_utils::serialize_properties"
    )]
    pub properties: Option<IndexMap<String, String>>,
    pub event_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_timestamp: Option<DateTime<FixedOffset>>,
}

impl FileMetadata {
    pub fn new(file: PathBuf, coverage: Interval, event_count: usize, banner: BannerDetails) -> Self {
        FileMetadata {
            file,
            coverage,
            zone: banner.zone,
            version: banner.version,
            os: banner.os,
            properties: banner.properties,
            event_count,
            banner_timestamp: banner.timestamp,
        }
    }

    pub fn interval(&self) -> Interval {
        self.coverage
    }
}

/// Pulls version, operating system and system properties out of the first
/// banner event of a file.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    markers: Vec<String>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(default_banner_markers())
    }
}

impl MetadataExtractor {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn is_banner(&self, event: &RawEvent) -> bool {
        self.markers
            .iter()
            .any(|marker| event.message.contains(marker.as_str()))
    }

    pub fn find_banner<'e, I>(&self, events: I) -> Option<&'e RawEvent>
    where
        I: IntoIterator<Item = &'e RawEvent>,
    {
        events.into_iter().find(|event| self.is_banner(event))
    }

    /// Details of the first banner event. Missing pieces stay `None`.
    pub fn extract<'e, I>(&self, events: I, default_zone: FixedOffset) -> BannerDetails
    where
        I: IntoIterator<Item = &'e RawEvent>,
    {
        let Some(banner) = self.find_banner(events) else {
            tracing::debug!("no banner event found");
            return BannerDetails::default();
        };
        BannerDetails {
            timestamp: banner.instant(default_zone),
            zone: banner.offset,
            version: version(&banner.message),
            os: operating_system(&banner.message),
            properties: properties(&banner.message),
        }
    }
}

pub fn version(message: &str) -> Option<String> {
    let captured = VERSION.captures(message)?.get(1)?.as_str();
    let version = captured.split('#').next().unwrap_or(captured).trim();
    (!version.is_empty()).then(|| version.to_string())
}

pub fn operating_system(message: &str) -> Option<String> {
    let os = OPERATING_SYSTEM.captures(message)?.get(1)?.as_str().trim();
    (!os.is_empty()).then(|| os.to_string())
}

/// `key=value` lines between the properties heading and the next section.
pub fn properties(message: &str) -> Option<IndexMap<String, String>> {
    let begin = message.find(PROPERTIES_BEGIN)? + PROPERTIES_BEGIN.len();
    let section = &message[begin..];
    let end = SECTION_MARKERS
        .iter()
        .filter_map(|marker| section.find(marker))
        .min()
        .unwrap_or(section.len());

    let table: IndexMap<String, String> = section[..end]
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect();
    Some(table)
}

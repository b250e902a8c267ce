use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, FixedOffset};

use crate::assembler::{assemble_lines, assemble_reader, AssemblerOptions, Assembly, EventAssembler};
use crate::config::ParserConfig;
use crate::error::{ConfigError, ParseError};
use crate::event::RawEvent;
use crate::file_access::{self, lossy_lines, ReverseLines};
use crate::interval::Interval;
use crate::metadata::{FileMetadata, MetadataExtractor};
use crate::pattern_compiler::CompiledPattern;

/// Single-file engine: coverage reads, full metadata parses and event dumps.
///
/// Holds no per-file state, so one parser can serve many threads at once.
#[derive(Debug)]
pub struct LogParser {
    pattern: CompiledPattern,
    coverage_options: AssemblerOptions,
    metadata_options: AssemblerOptions,
    default_zone: FixedOffset,
    extractor: MetadataExtractor,
}

impl LogParser {
    pub fn new(
        pattern: CompiledPattern,
        coverage_options: AssemblerOptions,
        metadata_options: AssemblerOptions,
        default_zone: FixedOffset,
        extractor: MetadataExtractor,
    ) -> Self {
        Self {
            pattern,
            coverage_options,
            metadata_options,
            default_zone,
            extractor,
        }
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.compile()?,
            config.assembler_options(config.line_mode),
            config.assembler_options(config.metadata_line_mode),
            config.default_zone,
            MetadataExtractor::new(config.banner_markers.clone()),
        ))
    }

    /// Coverage of a file, read from both ends without loading the middle.
    pub fn parse_interval(&self, path: &Path) -> Result<Interval, ParseError> {
        let last = file_access::last_non_blank_line(path)?
            .and_then(|line| self.single_line_event(&line));
        let last_recognized = last.is_some();

        let first = self.first_event(path, last_recognized)?;
        let last = match last {
            Some(event) => Some(event),
            None => self.last_event(path)?,
        };
        self.coverage(path, first.as_ref(), last.as_ref())
    }

    /// Coverage plus whatever the startup banner reveals.
    pub fn parse_metadata(&self, path: &Path) -> Result<FileMetadata, ParseError> {
        let assembly = self.parse_events(path)?;
        if assembly.events.is_empty() {
            return Err(ParseError::FormatNotRecognized(path.to_path_buf()));
        }
        let coverage = self.coverage(path, assembly.events.first(), assembly.events.last())?;
        let banner = self.extractor.extract(&assembly.events, self.default_zone);
        tracing::debug!(
            file = %path.display(),
            events = assembly.events.len(),
            version = ?banner.version,
            "parsed metadata"
        );
        Ok(FileMetadata::new(
            path.to_path_buf(),
            coverage,
            assembly.events.len(),
            banner,
        ))
    }

    /// Every event in a file, with assembly statistics.
    pub fn parse_events(&self, path: &Path) -> Result<Assembly, ParseError> {
        let reader = BufReader::new(file_access::open(path)?);
        let assembly = assemble_reader(&self.pattern, self.metadata_options.clone(), reader)
            .map_err(|e| ParseError::io(path, e))?;
        if !assembly.unmatched.is_empty() {
            tracing::debug!(
                file = %path.display(),
                lines = assembly.unmatched.len(),
                "lines outside any event"
            );
        }
        Ok(assembly)
    }

    fn coverage(
        &self,
        path: &Path,
        first: Option<&RawEvent>,
        last: Option<&RawEvent>,
    ) -> Result<Interval, ParseError> {
        let start = first.and_then(|e| e.instant(self.default_zone));
        let finish = last.and_then(|e| e.instant(self.default_zone));
        let zone = start.map_or(self.default_zone, |s: DateTime<FixedOffset>| *s.offset());
        Interval::new(zone, start, finish).map_err(|source| ParseError::Interval {
            path: path.to_path_buf(),
            source,
        })
    }

    fn single_line_event(&self, line: &str) -> Option<RawEvent> {
        assemble_lines(&self.pattern, self.coverage_options.clone(), [line])
            .events
            .into_iter()
            .next()
    }

    /// Forward scan that stops at the first event. Fails fast when neither
    /// the first nor the last non-blank line is a header.
    fn first_event(&self, path: &Path, last_recognized: bool) -> Result<Option<RawEvent>, ParseError> {
        let reader = BufReader::new(file_access::open(path)?);
        let mut assembler = EventAssembler::new(&self.pattern, self.coverage_options.clone());
        let mut seen_content = false;
        for line in lossy_lines(reader) {
            let line = line.map_err(|e| ParseError::io(path, e))?;
            if !seen_content && !line.trim().is_empty() {
                seen_content = true;
                if !last_recognized && self.single_line_event(&line).is_none() {
                    return Err(ParseError::FormatNotRecognized(path.to_path_buf()));
                }
            }
            assembler.push_line(&line);
            if assembler.has_events() {
                assembler.request_stop();
                break;
            }
        }
        if !seen_content {
            return Err(ParseError::FormatNotRecognized(path.to_path_buf()));
        }
        assembler.finish();
        Ok(assembler.next_event())
    }

    fn last_event(&self, path: &Path) -> Result<Option<RawEvent>, ParseError> {
        let lines = ReverseLines::new(file_access::open(path)?).map_err(|e| ParseError::io(path, e))?;
        for line in lines {
            let line = line.map_err(|e| ParseError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(event) = self.single_line_event(&line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntervalError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parser() -> LogParser {
        LogParser::from_config(&ParserConfig::default()).unwrap()
    }

    fn log_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const LOG: &str = "\
[info 2022/02/01 09:00:00.000 UTC <main> tid=0x1] Starting
  some detail
[warning 2022/02/01 09:30:00.000 UTC <worker-2> tid=0x2] Slow response
\tat org.example.Service.call(Service.java:10)
[error 2022/02/01 10:15:42.500 UTC <worker-3> tid=0x3] Failed
";

    #[test]
    fn test_parse_interval_reads_both_ends() {
        let file = log_file(LOG);
        let interval = parser().parse_interval(file.path()).unwrap();
        assert_eq!(interval.start().to_rfc3339(), "2022-02-01T09:00:00+00:00");
        assert_eq!(interval.finish().to_rfc3339(), "2022-02-01T10:15:42.500+00:00");
    }

    #[test]
    fn test_parse_interval_tolerates_garbage_at_one_end() {
        let file = log_file(&format!("{}trailing garbage\n\n", LOG));
        let interval = parser().parse_interval(file.path()).unwrap();
        assert_eq!(interval.finish().to_rfc3339(), "2022-02-01T10:15:42.500+00:00");

        let file = log_file(&format!("leading garbage\n{}", LOG));
        let interval = parser().parse_interval(file.path()).unwrap();
        assert_eq!(interval.start().to_rfc3339(), "2022-02-01T09:00:00+00:00");
    }

    #[test]
    fn test_parse_interval_rejects_unrecognized_format() {
        let file = log_file("just some text\n[info 2022/02/01 09:00:00.000 UTC <m> tid=1] x\nmore text\n");
        assert!(matches!(
            parser().parse_interval(file.path()),
            Err(ParseError::FormatNotRecognized(_))
        ));
        let empty = log_file("");
        assert!(matches!(
            parser().parse_interval(empty.path()),
            Err(ParseError::FormatNotRecognized(_))
        ));
        let blank = log_file("\n   \n\n");
        assert!(matches!(
            parser().parse_interval(blank.path()),
            Err(ParseError::FormatNotRecognized(_))
        ));
    }

    #[test]
    fn test_parse_interval_reports_backwards_clock() {
        let file = log_file(
            "[info 2022/02/01 10:00:00.000 UTC <m> tid=1] later\n\
             [info 2022/02/01 09:00:00.000 UTC <m> tid=1] earlier\n",
        );
        match parser().parse_interval(file.path()) {
            Err(ParseError::Interval { source, .. }) => {
                assert!(matches!(source, IntervalError::StartAfterFinish { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zone_less_timestamps_use_default_zone() {
        let config = ParserConfig {
            layout: "TIMESTAMP LEVEL MESSAGE".to_string(),
            timestamp_format: "yyyy-MM-dd HH:mm:ss".to_string(),
            default_zone: FixedOffset::east_opt(3600).unwrap(),
            ..ParserConfig::default()
        };
        let parser = LogParser::from_config(&config).unwrap();
        let file = log_file("2022-03-01 12:00:00 INFO up\n2022-03-01 13:00:00 INFO still up\n");
        let interval = parser.parse_interval(file.path()).unwrap();
        assert_eq!(interval.zone(), FixedOffset::east_opt(3600).unwrap());
        assert_eq!(interval.start().to_rfc3339(), "2022-03-01T12:00:00+01:00");
    }

    #[test]
    fn test_parse_metadata_without_banner_still_has_coverage() {
        let file = log_file(LOG);
        let metadata = parser().parse_metadata(file.path()).unwrap();
        assert_eq!(metadata.event_count, 3);
        assert_eq!(metadata.version, None);
        assert_eq!(metadata.zone, None);
        assert_eq!(metadata.interval(), parser().parse_interval(file.path()).unwrap());
    }

    #[test]
    fn test_parse_events_keeps_continuations() {
        let file = log_file(LOG);
        let assembly = parser().parse_events(file.path()).unwrap();
        assert_eq!(assembly.events.len(), 3);
        assert_eq!(assembly.events[0].message, "Starting\n  some detail");
        assert_eq!(assembly.events[1].stack_trace.len(), 1);
        assert_eq!(assembly.stats.events, 3);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            parser().parse_interval(&dir.path().join("gone.log")),
            Err(ParseError::Unreadable { .. })
        ));
    }
}

// src/lib.rs
pub mod assembler;
pub mod colors;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod file_access;
pub mod formatters;
pub mod interval;
pub mod metadata;
pub mod output_format;
pub mod parser;
pub mod pattern_compiler;
pub mod serde_utils;
pub mod timestamp;
pub mod tty;
pub mod walker;

pub use error::*;

pub use assembler::{assemble_lines, assemble_reader, AssemblerOptions, Assembly, AssemblyStats, EventAssembler, LineMode};
pub use config::{ParserConfig, Schedule};
pub use coordinator::{filter_by_window, FileParseCoordinator, ParseOutcome};
pub use event::{FieldKeyword, FieldValue, Level, RawEvent};
pub use interval::{Coverage, Interval};
pub use metadata::{FileMetadata, MetadataExtractor};
pub use output_format::{OutputFormat, OutputFormatter};
pub use parser::LogParser;
pub use pattern_compiler::{compile, CompiledPattern};

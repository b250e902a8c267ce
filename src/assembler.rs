use std::collections::VecDeque;
use std::io::{BufRead, Result as IoResult};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::event::{FieldKeyword, FieldValue, RawEvent};
use crate::file_access::lossy_lines;
use crate::pattern_compiler::CompiledPattern;

/// Appended to a header line whose final field was cut off, so the layout
/// can match it once more.
pub const REPAIR_SENTINEL: &str = "<truncated>";

/// What happens to a line that is neither a header nor a stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LineMode {
    /// Close the open event; the line joins the unmatched side channel.
    #[default]
    Isolate,
    /// Keep the line as a continuation of the open event's message.
    Append,
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub mode: LineMode,
    /// Lines containing any of these are never treated as truncated headers.
    pub repair_exclusions: Vec<String>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            mode: LineMode::Isolate,
            repair_exclusions: vec!["Caused by:".to_string(), " at ".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PendingLine {
    Plain(String),
    Exception(String),
}

impl PendingLine {
    fn into_text(self) -> String {
        match self {
            PendingLine::Plain(text) | PendingLine::Exception(text) => text,
        }
    }
}

/// Working buffers for the record being built.
#[derive(Debug, Default)]
pub struct AssemblerState {
    fields: IndexMap<FieldKeyword, FieldValue>,
    additional: Vec<PendingLine>,
    stop_requested: bool,
}

impl AssemblerState {
    fn has_exception(&self) -> bool {
        self.additional
            .iter()
            .any(|l| matches!(l, PendingLine::Exception(_)))
    }

    fn push(mut self, line: PendingLine) -> Self {
        self.additional.push(line);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub lines_read: usize,
    pub blank_lines: usize,
    pub events: usize,
    pub orphan_lines: usize,
    pub repaired_headers: usize,
}

/// Turns a file's lines into [`RawEvent`]s, one line at a time.
///
/// Feed lines with [`push_line`](Self::push_line), call
/// [`finish`](Self::finish) at end of input, and drain completed events with
/// [`take_events`](Self::take_events). Lines that could not be attached to
/// any event are collected on a side channel ([`take_unmatched`](Self::take_unmatched)).
pub struct EventAssembler<'p> {
    pattern: &'p CompiledPattern,
    options: AssemblerOptions,
    state: AssemblerState,
    events: VecDeque<RawEvent>,
    unmatched: Vec<String>,
    stats: AssemblyStats,
}

impl<'p> EventAssembler<'p> {
    pub fn new(pattern: &'p CompiledPattern, options: AssemblerOptions) -> Self {
        Self {
            pattern,
            options,
            state: AssemblerState::default(),
            events: VecDeque::new(),
            unmatched: Vec::new(),
            stats: AssemblyStats::default(),
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if self.state.stop_requested {
            return;
        }
        self.stats.lines_read += 1;
        if line.trim().is_empty() {
            self.stats.blank_lines += 1;
            return;
        }
        let state = std::mem::take(&mut self.state);
        self.state = self.step(state, line);
    }

    /// Flush whatever is still buffered. Call once at end of input.
    pub fn finish(&mut self) {
        let state = std::mem::take(&mut self.state);
        self.state = self.flush(state);
    }

    /// Ignore every line pushed from now on.
    pub fn request_stop(&mut self) {
        self.state.stop_requested = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stop_requested
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn next_event(&mut self) -> Option<RawEvent> {
        self.events.pop_front()
    }

    pub fn take_events(&mut self) -> Vec<RawEvent> {
        self.events.drain(..).collect()
    }

    pub fn take_unmatched(&mut self) -> Vec<String> {
        std::mem::take(&mut self.unmatched)
    }

    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }

    fn step(&mut self, state: AssemblerState, line: &str) -> AssemblerState {
        if let Some(fields) = self.pattern.decode_line(line) {
            return self.start_event(state, fields);
        }
        if let Some(fields) = self.repair_header(line) {
            self.stats.repaired_headers += 1;
            return self.start_event(state, fields);
        }
        if self.pattern.is_stack_frame(line) {
            return state.push(PendingLine::Exception(line.to_string()));
        }

        match self.options.mode {
            LineMode::Append => state.push(PendingLine::Plain(line.to_string())),
            LineMode::Isolate if !state.fields.is_empty() && !state.has_exception() => {
                self.flush(state).push(PendingLine::Plain(line.to_string()))
            }
            LineMode::Isolate => state.push(PendingLine::Plain(line.to_string())),
        }
    }

    fn start_event(
        &mut self,
        state: AssemblerState,
        fields: IndexMap<FieldKeyword, FieldValue>,
    ) -> AssemblerState {
        let mut next = self.flush(state);
        next.fields = fields;
        next
    }

    /// Emit the buffered event, or route orphan lines to the side channel
    /// when no header has been seen for them.
    fn flush(&mut self, state: AssemblerState) -> AssemblerState {
        let AssemblerState {
            fields,
            additional,
            stop_requested,
        } = state;

        if fields.is_empty() {
            if !additional.is_empty() {
                tracing::trace!(lines = additional.len(), "unmatched lines routed to side channel");
                self.stats.orphan_lines += additional.len();
                self.unmatched
                    .extend(additional.into_iter().map(PendingLine::into_text));
            }
        } else {
            let split = additional
                .iter()
                .position(|l| matches!(l, PendingLine::Exception(_)))
                .unwrap_or(additional.len());
            let mut lines = additional.into_iter().map(PendingLine::into_text);
            let continuation: Vec<String> = lines.by_ref().take(split).collect();
            let stack_trace: Vec<String> = lines.collect();
            self.events
                .push_back(RawEvent::assemble(fields, continuation, stack_trace));
            self.stats.events += 1;
        }

        AssemblerState {
            stop_requested,
            ..AssemblerState::default()
        }
    }

    /// Single retry for a header line that lost its final field: the line
    /// must end with the layout's terminator and carry no excluded marker.
    fn repair_header(&self, line: &str) -> Option<IndexMap<FieldKeyword, FieldValue>> {
        let terminator = self.pattern.terminator()?;
        let trimmed = line.trim_end();
        if trimmed.chars().last()? != terminator {
            return None;
        }
        if self
            .options
            .repair_exclusions
            .iter()
            .any(|marker| line.contains(marker.as_str()))
        {
            return None;
        }

        let mut fields = self
            .pattern
            .decode_line(&format!("{} {}", trimmed, REPAIR_SENTINEL))?;
        if let Some((_, value)) = fields.last_mut() {
            if value.as_text() == Some(REPAIR_SENTINEL) {
                *value = FieldValue::Text(String::new());
            }
        }
        tracing::debug!(line = trimmed, "repaired truncated header line");
        Some(fields)
    }
}

/// Result of assembling a whole stream.
#[derive(Debug, Default)]
pub struct Assembly {
    pub events: Vec<RawEvent>,
    pub unmatched: Vec<String>,
    pub stats: AssemblyStats,
}

pub fn assemble_lines<I, S>(pattern: &CompiledPattern, options: AssemblerOptions, lines: I) -> Assembly
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut assembler = EventAssembler::new(pattern, options);
    for line in lines {
        assembler.push_line(line.as_ref());
    }
    assembler.finish();
    Assembly {
        events: assembler.take_events(),
        unmatched: assembler.take_unmatched(),
        stats: assembler.stats().clone(),
    }
}

pub fn assemble_reader<R: BufRead>(
    pattern: &CompiledPattern,
    options: AssemblerOptions,
    reader: R,
) -> IoResult<Assembly> {
    let mut assembler = EventAssembler::new(pattern, options);
    for line_result in lossy_lines(reader) {
        assembler.push_line(&line_result?);
    }
    assembler.finish();
    Ok(Assembly {
        events: assembler.take_events(),
        unmatched: assembler.take_unmatched(),
        stats: assembler.stats().clone(),
    })
}

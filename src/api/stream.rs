use crate::logging::{emit_ignored_line, emit_oversized_line, emit_sse_parse_error};
use crate::types::StreamEvent;

pub const DATA_PREFIX: &str = "data: ";
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Counters for records that never reached the render state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub events: usize,
    pub ignored_lines: usize,
    pub malformed_lines: usize,
    pub oversized_lines: usize,
}

enum LineOutcome {
    Event(StreamEvent),
    /// Record separator; not noise.
    Blank,
    Ignored,
    Malformed,
}

/// Splits a byte stream into `\n`-terminated `data: ` records.
///
/// Bytes are buffered undecoded so a UTF-8 sequence split across two chunks
/// decodes correctly once its line is complete. A line is only parsed after
/// its terminating `\n` has arrived.
pub struct StreamParser {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
    stats: ParseStats,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
            discarding: false,
            stats: ParseStats::default(),
        }
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(newline) = rest.iter().position(|byte| *byte == b'\n') {
            let head = &rest[..newline];
            rest = &rest[newline + 1..];

            if self.discarding {
                // Tail of a line that already overflowed the bound.
                self.discarding = false;
                self.buffer.clear();
                continue;
            }

            let line_len = self.buffer.len() + head.len();
            if line_len > self.max_line_bytes {
                self.buffer.clear();
                self.note_oversized(line_len);
                continue;
            }

            self.buffer.extend_from_slice(head);
            let outcome = parse_line(&self.buffer);
            self.buffer.clear();
            self.record(outcome, &mut events);
        }

        if !rest.is_empty() && !self.discarding {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() > self.max_line_bytes {
                let buffered = self.buffer.len();
                self.buffer = Vec::new();
                self.discarding = true;
                self.note_oversized(buffered);
            }
        }

        events
    }

    /// Drops any unterminated carry-over and returns it for diagnostics.
    pub fn flush(&mut self) -> String {
        self.discarding = false;
        let leftover = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&leftover).into_owned()
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn record(&mut self, outcome: LineOutcome, events: &mut Vec<StreamEvent>) {
        match outcome {
            LineOutcome::Event(event) => {
                self.stats.events += 1;
                events.push(event);
            }
            LineOutcome::Blank => {}
            LineOutcome::Ignored => self.stats.ignored_lines += 1,
            LineOutcome::Malformed => self.stats.malformed_lines += 1,
        }
    }

    fn note_oversized(&mut self, observed: usize) {
        self.stats.oversized_lines += 1;
        emit_oversized_line(observed, self.max_line_bytes);
    }
}

fn parse_line(raw: &[u8]) -> LineOutcome {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);

    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        emit_ignored_line(&line);
        return LineOutcome::Ignored;
    };

    match StreamEvent::from_json(data) {
        Ok(event) => LineOutcome::Event(event),
        Err(error) => {
            emit_sse_parse_error(data, &error);
            LineOutcome::Malformed
        }
    }
}

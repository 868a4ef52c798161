//! SSE (Server-Sent Events) parsing utilities
//!
//! Turns arbitrarily chunked text into discrete events. Partial lines and
//! partially built events are carried across `feed` calls, so the parsed
//! event sequence does not depend on where the transport split the stream.

use std::borrow::Cow;
use std::mem;

use tracing::{debug, trace};

/// Byte order mark stripped from the start of a stream
const BOM: char = '\u{FEFF}';

/// An event produced by [`EventParser`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A dispatched event with its joined data lines
    Event {
        event: Option<String>,
        data: String,
        id: Option<String>,
    },
    /// The server advertised a reconnection delay (`retry:` field)
    ReconnectInterval { retry_ms: u64 },
}

impl ParsedEvent {
    /// Data payload, if this is a dispatched event
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::Event { data, .. } => Some(data),
            Self::ReconnectInterval { .. } => None,
        }
    }
}

/// Incremental SSE parser
#[derive(Debug, Default)]
pub struct EventParser {
    /// Unterminated line carried over from previous chunks
    partial_line: String,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to that terminator
    skip_lf: bool,
    /// Whether any non-empty input has been seen (for BOM stripping)
    started: bool,
    data: Option<String>,
    event_name: Option<String>,
    id: Option<String>,
    event_count: usize,
    skipped_lines: usize,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect the events it completes
    pub fn feed(&mut self, chunk: &str) -> Vec<ParsedEvent> {
        let mut events = Vec::new();
        self.feed_with(chunk, |event| events.push(event));
        events
    }

    /// Feed a chunk, invoking `on_event` once per completed event in order
    pub fn feed_with<F>(&mut self, chunk: &str, mut on_event: F)
    where
        F: FnMut(ParsedEvent),
    {
        let mut rest = chunk;
        if rest.is_empty() {
            return;
        }

        if !self.started {
            self.started = true;
            rest = rest.strip_prefix(BOM).unwrap_or(rest);
        }

        if self.skip_lf && !rest.is_empty() {
            self.skip_lf = false;
            rest = rest.strip_prefix('\n').unwrap_or(rest);
        }

        while let Some(pos) = rest.find(['\r', '\n']) {
            let mut next = pos + 1;
            if rest.as_bytes()[pos] == b'\r' {
                if next == rest.len() {
                    self.skip_lf = true;
                } else if rest.as_bytes()[next] == b'\n' {
                    next += 1;
                }
            }

            let line = if self.partial_line.is_empty() {
                Cow::Borrowed(&rest[..pos])
            } else {
                let mut line = mem::take(&mut self.partial_line);
                line.push_str(&rest[..pos]);
                Cow::Owned(line)
            };
            self.process_line(&line, &mut on_event);

            rest = &rest[next..];
        }

        self.partial_line.push_str(rest);
    }

    /// Number of events dispatched so far
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Number of lines skipped as malformed framing
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Whether a line or event is still waiting for its terminator
    pub fn has_pending(&self) -> bool {
        !self.partial_line.is_empty() || self.data.is_some()
    }

    /// Discard all buffered state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn process_line<F>(&mut self, line: &str, on_event: &mut F)
    where
        F: FnMut(ParsedEvent),
    {
        if line.is_empty() {
            self.dispatch(on_event);
            return;
        }

        // SSE comment
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "event" => {
                self.event_name = (!value.is_empty()).then(|| value.to_string());
            }
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => match parse_retry(value) {
                Some(retry_ms) => {
                    debug!("SSE retry interval advertised: {}ms", retry_ms);
                    on_event(ParsedEvent::ReconnectInterval { retry_ms });
                }
                None => self.skip(line),
            },
            _ => self.skip(line),
        }
    }

    fn dispatch<F>(&mut self, on_event: &mut F)
    where
        F: FnMut(ParsedEvent),
    {
        let event = self.event_name.take();
        let id = self.id.take();
        if let Some(data) = self.data.take() {
            self.event_count += 1;
            on_event(ParsedEvent::Event { event, data, id });
        }
    }

    fn skip(&mut self, line: &str) {
        self.skipped_lines += 1;
        trace!("Skipping malformed SSE line: {:?}", line);
    }
}

fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Decodes a byte stream as UTF-8 across chunk boundaries.
///
/// An incomplete multi-byte sequence at the end of a chunk is held until the
/// next one arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut combined = mem::take(&mut self.pending);
            combined.extend_from_slice(bytes);
            Cow::Owned(combined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

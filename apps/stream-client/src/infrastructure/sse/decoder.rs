//! Incremental SSE Decoder
//!
//! Decodes the server-sent-event wire format from arbitrary byte chunks.
//! HTTP bodies arrive in chunks that do not respect line or event
//! boundaries, so the decoder buffers partial lines across calls and only
//! dispatches a frame once the terminating blank line is seen.
//!
//! Field handling follows the SSE format:
//!
//! - `data:` lines accumulate; multi-line data is joined with `\n`
//! - `event:` sets the frame's event name
//! - lines starting with `:` are comments (keep-alives) and are skipped
//! - other fields (`id:`, `retry:`) are ignored
//! - a blank line dispatches the accumulated frame; frames with no data
//!   dispatch nothing

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name from the last `event:` line, if any.
    pub event: Option<String>,
    /// Accumulated data payload.
    pub data: String,
}

/// Stateful SSE decoder. Feed byte chunks, collect dispatched frames.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, not-yet-terminated line.
    buffer: Vec<u8>,
    /// Event name accumulated for the pending frame.
    event_name: Option<String>,
    /// Data lines accumulated for the pending frame.
    data: String,
    /// Whether the pending frame has seen at least one `data:` line.
    has_data: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning all frames it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                    frames.push(frame);
                }
            } else {
                self.buffer.push(byte);
            }
        }

        frames
    }

    /// Dispatch any frame still pending when the stream ends.
    ///
    /// A trailing line without a final newline is processed first; servers
    /// that close the body right after the last `data:` line still get
    /// their frame delivered.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    /// Process one complete line; returns a frame on the terminating blank.
    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive line.
        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = field_value(line, "data") {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        } else if let Some(value) = field_value(line, "event") {
            self.event_name = Some(value.to_string());
        }
        // Unknown fields (id, retry, ...) are skipped.

        None
    }

    /// Emit the pending frame, if it carries data.
    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event_name.take();
        let data = std::mem::take(&mut self.data);
        let has_data = std::mem::take(&mut self.has_data);

        if has_data && !data.is_empty() {
            Some(SseFrame { event, data })
        } else {
            None
        }
    }
}

/// Extract a field's value if `line` starts with `{field}:`.
///
/// A single space after the colon is optional and not part of the value.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let value = rest.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

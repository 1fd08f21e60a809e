//! Line framing for server-sent event streams.

use tracing::warn;

/// Longest unterminated line the decoder buffers before dropping it.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched push-channel message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Value of the last `id:` field, if any.
    pub id: Option<String>,
}

impl Frame {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }
}

/// Incremental `text/event-stream` parser.
///
/// Feed raw byte chunks as they arrive; chunk boundaries may fall anywhere,
/// including inside a line or a multi-byte character. A frame is dispatched
/// on each blank line that follows at least one `data:` field.
///
/// A line still unterminated after `max_line` bytes is dropped together
/// with the rest of its frame.
#[derive(Debug)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    max_line: usize,
    /// Skipping bytes up to the next newline.
    skip_line: bool,
    /// Skipping lines up to the next blank line.
    skip_frame: bool,
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            id: None,
            max_line: max_line.max(1),
            skip_line: false,
            skip_frame: false,
        }
    }

    /// Consumes a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut chunk = chunk;
        if self.skip_line {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    self.skip_line = false;
                    chunk = &chunk[newline + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line {
            warn!(
                buffered = self.buffer.len(),
                limit = self.max_line,
                "Dropping oversized push line"
            );
            self.buffer.clear();
            self.discard_frame();
            self.skip_line = true;
            self.skip_frame = true;
        }
        frames
    }

    /// Flushes state at end of stream.
    ///
    /// A trailing line without a newline is processed, and pending data is
    /// dispatched even without the closing blank line.
    pub fn finish(&mut self) -> Option<Frame> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if self.skip_frame {
            if line.is_empty() {
                self.skip_frame = false;
                self.discard_frame();
            }
            return None;
        }
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields are ignored.
            _ => {}
        }
        None
    }

    fn discard_frame(&mut self) {
        self.event = None;
        self.data.clear();
        self.id = None;
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame { event, data, id })
    }
}

use tracing::debug;
use super::types::StreamEvent;

/// One complete server-sent event frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental frame tokenizer over an unaligned byte stream.
///
/// Bytes are buffered until a blank line closes a frame, so chunk
/// boundaries (including ones inside a UTF-8 sequence) never change the
/// frames produced.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(end) = find_blank_line(&self.buffer[consumed..]) {
            let raw = &self.buffer[consumed..consumed + end];
            if let Some(frame) = parse_frame(raw) {
                frames.push(frame);
            }
            consumed += end + 2;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        frames
    }

    /// Bytes still waiting for their terminating blank line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream. An unterminated trailing frame is discarded.
    pub fn finish(&mut self) {
        if self.buffer.iter().any(|b| !b.is_ascii_whitespace()) {
            debug!(bytes = self.buffer.len(), "Discarding incomplete trailing SSE frame");
        }
        self.buffer.clear();
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(raw: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(raw);
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data_lines.push(value),
            "event" => frame.event = Some(value.to_string()),
            "id" => frame.id = Some(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}

/// Decode a frame's payload; malformed payloads are dropped.
pub fn parse_event(frame: &SseFrame) -> Option<StreamEvent> {
    match serde_json::from_str::<StreamEvent>(&frame.data) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, len = frame.data.len(), "Dropping malformed stream frame");
            None
        }
    }
}

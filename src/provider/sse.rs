//! Incremental parser for upstream server-sent event bodies.

use super::ProviderError;

/// Largest event the parser buffers before giving up on the upstream.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// One SSE event parsed from an upstream body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: Option<String>,
}

/// SSE parser state.
///
/// Bytes are buffered until a blank line closes an event, so events and
/// multi-byte UTF-8 sequences may be split across network chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Buffer offset before which no boundary can start
    scanned: usize,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    ///
    /// Fails once an unterminated event grows past [`MAX_EVENT_BYTES`].
    pub fn parse(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, ProviderError> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_boundary(&self.buffer, self.scanned) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.scanned = 0;
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                events.push(event);
            }
        }

        // The last byte may be the first half of a boundary.
        self.scanned = self.buffer.len().saturating_sub(1);

        if self.buffer.len() > MAX_EVENT_BYTES {
            return Err(ProviderError::Malformed(format!(
                "upstream event exceeds {} bytes",
                MAX_EVENT_BYTES
            )));
        }
        Ok(events)
    }

    /// Flush a trailing event the upstream did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        parse_block(&String::from_utf8_lossy(&rest))
    }
}

fn find_boundary(buffer: &[u8], from: usize) -> Option<usize> {
    buffer[from..]
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| pos + from)
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => match event.data {
                Some(ref mut data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => event.data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    (event.event.is_some() || event.data.is_some()).then_some(event)
}

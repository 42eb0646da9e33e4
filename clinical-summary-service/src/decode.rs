use serde::{Deserialize, Serialize};
use tracing::warn;

/// One line of a newline-delimited generation stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    /// Incremental token fragment.
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Outcome of attempting to parse one line of the stream.
#[derive(Debug)]
pub enum LineParse {
    Chunk(StreamChunk),
    /// Nothing to parse yet (blank line).
    Incomplete,
    /// The line is not valid JSON. While the stream is open this means the
    /// object is still being transmitted and the line must be retried once
    /// more bytes arrive; at end of stream it is dropped.
    Malformed(serde_json::Error),
}

pub fn parse_line(line: &str) -> LineParse {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineParse::Incomplete;
    }
    match serde_json::from_str::<StreamChunk>(trimmed) {
        Ok(chunk) => LineParse::Chunk(chunk),
        Err(err) => LineParse::Malformed(err),
    }
}

/// Incremental decoder for a newline-delimited JSON generation stream.
///
/// Bytes are pushed in as they arrive; everything before the last newline is
/// treated as complete lines and parsed in order, the trailing fragment is
/// retained for the next push. A line that does not parse stays in the
/// buffer and is retried on the next push — only [`StreamDecoder::finish`]
/// gives up on it. `response` fields of parsed chunks accumulate into the
/// running text exposed by [`StreamDecoder::accumulated`].
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
    accumulated: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly received bytes, returning the chunks that became decodable.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buf.extend_from_slice(bytes);
        self.drain_lines()
    }

    fn drain_lines(&mut self) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while !self.done {
            let Some(newline) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line = match std::str::from_utf8(&self.buf[..newline]) {
                Ok(line) => line,
                // Invalid UTF-8 up to a newline cannot become valid later;
                // treat it like any other undecodable line and wait for the
                // end-of-stream drop.
                Err(_) => break,
            };
            match parse_line(line) {
                LineParse::Chunk(chunk) => {
                    self.buf.drain(..=newline);
                    self.accept(&chunk);
                    chunks.push(chunk);
                }
                LineParse::Incomplete => {
                    self.buf.drain(..=newline);
                }
                LineParse::Malformed(_) => break,
            }
        }
        chunks
    }

    fn accept(&mut self, chunk: &StreamChunk) {
        self.accumulated.push_str(&chunk.response);
        if chunk.done {
            self.done = true;
        }
    }

    /// Signal end of stream: make a final parse attempt on whatever is left
    /// in the buffer. Lines that still do not parse are logged and dropped.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        let residue = std::mem::take(&mut self.buf);
        let mut chunks = Vec::new();
        if self.done {
            return chunks;
        }
        let text = String::from_utf8_lossy(&residue);
        for line in text.lines() {
            if self.done {
                break;
            }
            match parse_line(line) {
                LineParse::Chunk(chunk) => {
                    self.accept(&chunk);
                    chunks.push(chunk);
                }
                LineParse::Incomplete => {}
                LineParse::Malformed(err) => {
                    warn!(%err, line, "dropping stream line that never became valid JSON");
                }
            }
        }
        chunks
    }

    /// The concatenation of every decoded chunk's `response`, in arrival
    /// order.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// True once a chunk with `done: true` has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

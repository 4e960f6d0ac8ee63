//! Transcript buffer
//!
//! Append-only log of display lines produced by the backend process, plus
//! the per-channel decoder that turns raw output bytes into text.

/// One row of transcript text
pub type DisplayLine = String;

/// Number of lines exposed to the renderer by default
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 100;

/// Ordered, append-only sequence of display lines
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    lines: Vec<DisplayLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Split `text` into lines and append each one in order.
    ///
    /// Both `\n` and `\r\n` terminate a line. A trailing terminator does not
    /// produce an extra empty line, and empty input appends nothing.
    /// Returns the number of lines appended.
    pub fn append(&mut self, text: &str) -> usize {
        let before = self.lines.len();
        for line in split_lines(text) {
            self.lines.push(line.to_string());
        }
        self.lines.len() - before
    }

    /// Append a single line verbatim, without splitting
    pub fn push_line(&mut self, line: impl Into<DisplayLine>) {
        self.lines.push(line.into());
    }

    /// The last `limit` lines in arrival order
    pub fn snapshot(&self, limit: usize) -> &[DisplayLine] {
        let start = self.lines.len().saturating_sub(limit);
        &self.lines[start..]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split text on `\n`, stripping a `\r` that precedes each terminator
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let pieces = if text.is_empty() { None } else { Some(body.split('\n')) };
    pieces
        .into_iter()
        .flatten()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Incremental UTF-8 decoder for one output channel.
///
/// Pipe reads can cut a multi-byte character in half; the incomplete tail is
/// held back until the next chunk arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Decode a chunk, returning all complete text seen so far
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            // Incomplete sequence at the end; keep for next chunk
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;
        out
    }

    /// Flush any held-back bytes at end of stream
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

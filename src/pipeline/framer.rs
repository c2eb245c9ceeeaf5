//! Incremental newline framing over a raw byte pipe, and the line → event mapping.
//!
//! The framer knows nothing about processes: feed it chunks as they arrive, however the
//! transport split them, and it hands back only complete lines. A trailing partial line stays
//! buffered and is joined with the next chunk.

use crate::types::ProgressEvent;

#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without the terminator (`\n` or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last_nl) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_nl + 1);
        let mut complete = std::mem::replace(&mut self.pending, rest);
        complete.pop();
        complete.split(|&b| b == b'\n').map(decode_line).collect()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// End of stream: the unterminated tail, if any.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(decode_line(&self.pending))
        }
    }
}

// Bytes are only decoded once a full line is in hand, so a multi-byte character split across
// reads is never mangled.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// A standard-output line: a structured event when it parses as one, otherwise a `log` event
/// carrying the raw text. Blank lines produce nothing.
pub fn stdout_event(line: &str) -> Option<ProgressEvent> {
    if line.trim().is_empty() {
        return None;
    }
    match ProgressEvent::from_line(line) {
        Ok(event) => Some(event),
        Err(_) => Some(ProgressEvent::log(line)),
    }
}

/// A standard-error line is never structured progress.
pub fn stderr_event(line: &str) -> Option<ProgressEvent> {
    if line.trim().is_empty() {
        return None;
    }
    Some(ProgressEvent::log(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_partial_line() {
        let mut f = LineFramer::new();
        assert!(f.push(b"abc").is_empty());
        assert_eq!(f.pending(), b"abc");
        assert_eq!(f.push(b"def\nxy"), vec!["abcdef".to_string()]);
        assert_eq!(f.finish(), Some("xy".to_string()));
    }

    #[test]
    fn strips_carriage_returns_and_keeps_empty_lines() {
        let mut f = LineFramer::new();
        assert_eq!(
            f.push(b"one\r\n\ntwo\n"),
            vec!["one".to_string(), String::new(), "two".to_string()]
        );
        assert!(f.finish().is_none());
    }

    #[test]
    fn multibyte_char_split_across_reads() {
        let bytes = "héllo\n".as_bytes();
        let mut f = LineFramer::new();
        assert!(f.push(&bytes[..2]).is_empty());
        assert_eq!(f.push(&bytes[2..]), vec!["héllo".to_string()]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert!(stdout_event("   ").is_none());
        assert!(stderr_event("").is_none());
    }
}

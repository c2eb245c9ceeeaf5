//! Streaming responses written straight to the socket.
//!
//! Each event is sent as its own chunk and flushed immediately so the client sees progress as it
//! happens. HTTP/1.0 clients get an identity body terminated by connection close.

use log::{debug, warn};
use std::io::{self, Write};

use crate::types::ProgressEvent;

/// Writes the status line and headers of a streaming response.
pub fn write_stream_head<W: Write>(out: &mut W, run_id: &str, chunked: bool) -> io::Result<()> {
    let version = if chunked { "HTTP/1.1" } else { "HTTP/1.0" };
    write!(out, "{version} 200 OK\r\n")?;
    out.write_all(b"Content-Type: text/plain; charset=utf-8\r\n")?;
    out.write_all(b"Cache-Control: no-cache\r\n")?;
    if chunked {
        out.write_all(b"Transfer-Encoding: chunked\r\n")?;
    }
    out.write_all(b"Connection: close\r\n")?;
    write!(out, "X-Run-Id: {run_id}\r\n\r\n")?;
    out.flush()
}

pub struct ChunkedWriter<W: Write> {
    inner: W,
    chunked: bool,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(inner: W, chunked: bool) -> Self {
        ChunkedWriter { inner, chunked }
    }

    pub fn write_event(&mut self, event: &ProgressEvent) -> io::Result<()> {
        self.write_chunk(event.to_line().as_bytes())
    }

    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.chunked {
            write!(self.inner, "{:x}\r\n", data.len())?;
            self.inner.write_all(data)?;
            self.inner.write_all(b"\r\n")?;
        } else {
            self.inner.write_all(data)?;
        }
        self.inner.flush()
    }

    /// Terminating zero-length chunk. Returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.chunked {
            self.inner.write_all(b"0\r\n\r\n")?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Forward every event to `writer`, then close the body. Returns the number of events sent.
///
/// A write error means the client is gone: `events` is dropped on return, which for a live
/// run terminates its process group.
pub fn relay_to_writer<I, W>(events: I, mut writer: ChunkedWriter<W>) -> io::Result<usize>
where
    I: IntoIterator<Item = ProgressEvent>,
    W: Write,
{
    let mut sent = 0usize;
    for event in events {
        if let Err(e) = writer.write_event(&event) {
            warn!("Client disconnected after {} events: {}", sent, e);
            return Err(e);
        }
        sent += 1;
    }
    writer.finish()?;
    debug!("Stream closed after {} events", sent);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_framing() {
        let mut w = ChunkedWriter::new(Vec::new(), true);
        w.write_event(&ProgressEvent::done("ok")).unwrap();
        let out = w.finish().unwrap();
        let text = String::from_utf8(out).unwrap();
        let line = "{\"type\":\"done\",\"message\":\"ok\"}\n";
        assert_eq!(text, format!("{:x}\r\n{line}\r\n0\r\n\r\n", line.len()));
    }

    #[test]
    fn identity_body_for_http10() {
        let events = vec![ProgressEvent::log("a"), ProgressEvent::done("b")];
        let mut buf = Vec::new();
        let sent = relay_to_writer(events, ChunkedWriter::new(&mut buf, false)).unwrap();
        assert_eq!(sent, 2);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("\r\n"));
    }

    #[test]
    fn head_has_stream_headers() {
        let mut buf = Vec::new();
        write_stream_head(&mut buf, "abc", true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.contains("Cache-Control: no-cache\r\n"));
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("X-Run-Id: abc\r\n\r\n"));
    }
}

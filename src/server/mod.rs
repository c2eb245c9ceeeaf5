//! HTTP service: a `tiny_http` listener with a fixed pool of worker threads.
//!
//! JSON responses are answered on the worker. Streaming responses are handed to a dedicated
//! thread that owns the socket for the lifetime of the run.

pub mod multipart;
pub mod response;
pub mod routes;
pub mod stream;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tiny_http::{Header, Request, Response, Server};

use crate::error::IngestError;
use crate::orchestrator::{Orchestrator, RunStream};

pub use response::{ApiResponse, ResponseBody};
pub use routes::{ApiRequest, dispatch};

/// Bind and serve until Ctrl-C.
pub fn serve(app: Orchestrator) -> Result<()> {
    let bind = app.settings().bind.clone();
    let workers = app.settings().workers.max(1);
    let server = Arc::new(Server::http(&bind).map_err(|e| anyhow!("failed to bind {bind}: {e}"))?);
    let app = Arc::new(app);
    let stopping = Arc::new(AtomicBool::new(false));

    {
        let server = Arc::clone(&server);
        let stopping = Arc::clone(&stopping);
        ctrlc::set_handler(move || {
            if stopping.swap(true, Ordering::SeqCst) {
                return;
            }
            info!("Shutting down");
            for _ in 0..workers {
                server.unblock();
            }
        })?;
    }

    info!("Listening on http://{} ({} workers, {} mode)", bind, workers, app.settings().mode);
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let srv = Arc::clone(&server);
            let app = Arc::clone(&app);
            let stopping = Arc::clone(&stopping);
            thread::Builder::new()
                .name(format!("http-{i}"))
                .spawn(move || {
                    while !stopping.load(Ordering::SeqCst) {
                        let request = match srv.recv() {
                            Ok(r) => r,
                            Err(_) => break,
                        };
                        handle_request(&app, request);
                    }
                })
        })
        .collect::<std::io::Result<_>>()?;

    for handle in handles {
        if handle.join().is_err() {
            warn!("HTTP worker panicked");
        }
    }
    Ok(())
}

fn handle_request(app: &Orchestrator, mut request: Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    let limit = app.settings().max_upload_bytes;
    let declared = request.body_length();
    let body = match read_limited(request.as_reader(), declared, limit) {
        Ok(body) => body,
        Err(BodyError::TooLarge(e)) => {
            warn!("{} {}: {}", method, url, e);
            respond(request, ApiResponse::error(e.status(), e.to_string()));
            return;
        }
        Err(BodyError::Io(e)) => {
            warn!("{} {}: failed to read body: {}", method, url, e);
            respond(request, ApiResponse::error(400, "Could not read request body."));
            return;
        }
    };

    let api = ApiRequest {
        method: &method,
        url: &url,
        content_type: content_type.as_deref(),
        body: &body,
    };
    let response = dispatch(app, &api);
    info!("{} {} -> {}", method, url, response.status);
    drop(body);
    respond(request, response);
}

#[derive(Debug)]
enum BodyError {
    TooLarge(IngestError),
    Io(std::io::Error),
}

/// Read at most `limit` bytes. The buffer grows with what actually arrives, whatever the
/// client declared.
fn read_limited(reader: impl Read, declared: Option<usize>, limit: u64) -> Result<Vec<u8>, BodyError> {
    let too_large = || BodyError::TooLarge(IngestError::PayloadTooLarge { limit });
    if declared.is_some_and(|len| len as u64 > limit) {
        return Err(too_large());
    }
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(BodyError::Io)?;
    if body.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(body)
}

fn respond(request: Request, response: ApiResponse) {
    match response.body {
        ResponseBody::Json(value) => {
            let mut out = Response::from_string(value.to_string()).with_status_code(response.status);
            if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
                out.add_header(h);
            }
            if let Err(e) = request.respond(out) {
                debug!("Failed to send response: {}", e);
            }
        }
        ResponseBody::Stream(stream) => {
            let name = format!("stream-{}", stream.run().id);
            let spawned = thread::Builder::new()
                .name(name)
                .spawn(move || stream_response(request, stream));
            if let Err(e) = spawned {
                warn!("Could not start stream thread: {}", e);
            }
        }
    }
}

fn stream_response(request: Request, events: RunStream) {
    let version = request.http_version();
    let chunked = !(version.0 == 1 && version.1 == 0);
    let run_id = events.run().id.clone();
    let mut out = request.into_writer();
    if let Err(e) = stream::write_stream_head(&mut out, &run_id, chunked) {
        warn!("run {}: client gone before stream start: {}", run_id, e);
        return;
    }
    let writer = stream::ChunkedWriter::new(out, chunked);
    match stream::relay_to_writer(events, writer) {
        Ok(n) => debug!("run {}: streamed {} events", run_id, n),
        Err(e) => warn!("run {}: stream aborted: {}", run_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn body_within_limit() {
        let body = read_limited(Cursor::new(b"hello".to_vec()), Some(5), 5).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn declared_length_over_limit_is_rejected_before_reading() {
        let err = read_limited(Cursor::new(Vec::new()), Some(usize::MAX), 16).unwrap_err();
        let e = match err {
            BodyError::TooLarge(e) => e,
            BodyError::Io(e) => panic!("expected TooLarge, got {e}"),
        };
        assert_eq!(e.status(), 413);
        assert_eq!(e.to_string(), "upload exceeds the 16 byte limit");
    }

    #[test]
    fn undeclared_body_over_limit_is_rejected() {
        let err = read_limited(Cursor::new(vec![0u8; 17]), None, 16).unwrap_err();
        assert!(matches!(err, BodyError::TooLarge(IngestError::PayloadTooLarge { limit: 16 })));
    }
}

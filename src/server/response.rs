//! Response adapter: orchestrator outcomes → status code and body.

use serde_json::{Value, json};

use crate::error::IngestError;
use crate::orchestrator::{IngestOutcome, RunStream};
use crate::pipeline::query::Answer;
use crate::utils::config::Messages;

pub enum ResponseBody {
    Json(Value),
    /// Live NDJSON event sequence, written as the run progresses.
    Stream(RunStream),
}

pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        ApiResponse {
            status,
            body: ResponseBody::Json(body),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    /// JSON body, if this is not a stream.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Stream(_) => None,
        }
    }
}

/// `POST /videos`.
pub fn ingest_response(result: Result<IngestOutcome, IngestError>) -> ApiResponse {
    match result {
        Ok(IngestOutcome::Completed { run, result }) => ApiResponse::json(
            200,
            json!({ "message": Messages::INGEST_COMPLETE, "run_id": run.id, "result": result }),
        ),
        Ok(IngestOutcome::Started { run, .. }) => ApiResponse::json(
            202,
            json!({ "message": Messages::INGEST_STARTED, "run_id": run.id }),
        ),
        Ok(IngestOutcome::Streaming(stream)) => ApiResponse {
            status: 200,
            body: ResponseBody::Stream(stream),
        },
        Err(e) => ApiResponse::error(e.status(), e.to_string()),
    }
}

/// `GET /courses`. Failures still carry an empty `courses` list.
pub fn courses_response(result: Result<Vec<Value>, IngestError>) -> ApiResponse {
    match result {
        Ok(courses) => ApiResponse::json(200, json!({ "courses": courses })),
        Err(e) => {
            let message = query_failure(&e, Messages::COURSES_FAILED, Messages::COURSES_INVALID);
            ApiResponse::json(e.status(), json!({ "courses": [], "error": message }))
        }
    }
}

/// `POST /student-query`.
pub fn answer_response(result: Result<Answer, IngestError>) -> ApiResponse {
    match result {
        Ok(Answer::Found(payload)) => ApiResponse::json(200, payload),
        Ok(Answer::Rejected(message)) => ApiResponse::error(404, message),
        Err(e) => ApiResponse::error(
            e.status(),
            query_failure(&e, Messages::ANSWER_FAILED, Messages::ANSWER_INVALID),
        ),
    }
}

/// Process diagnostics pass through verbatim; an exit without any output gets `failed`, and
/// unparseable output gets `invalid`.
fn query_failure(e: &IngestError, failed: &str, invalid: &str) -> String {
    match e {
        IngestError::Process { diagnostic, .. } if diagnostic.is_empty() => failed.to_string(),
        IngestError::Process { diagnostic, .. } => diagnostic.clone(),
        IngestError::Protocol(_) => invalid.to_string(),
        other => other.to_string(),
    }
}

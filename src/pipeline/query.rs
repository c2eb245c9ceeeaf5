//! Course listing and question answering: blocking runs of the two read-side scripts.

use serde_json::Value;
use std::path::Path;

use crate::error::IngestError;
use crate::pipeline::args::{LaunchSpec, StorageTarget, answer_args, list_courses_args};
use crate::pipeline::launcher::ProcessLauncher;
use crate::utils::config::PipelineScripts;

/// What the answer script decided about a question.
#[derive(Clone, Debug, PartialEq)]
pub enum Answer {
    /// Payload forwarded to the caller as-is.
    Found(Value),
    /// The script reported its own `error` (unknown course, nothing indexed, ...).
    Rejected(String),
}

pub fn list_courses(
    launcher: &ProcessLauncher,
    runtime: &Path,
    scripts_dir: &Path,
    storage: StorageTarget<'_>,
) -> Result<Vec<Value>, IngestError> {
    let script = scripts_dir.join(PipelineScripts::LIST_COURSES);
    let spec = LaunchSpec::new(runtime, list_courses_args(&script, storage));
    let payload = launcher.run_blocking(&spec)?;
    Ok(courses_from_payload(&payload))
}

pub fn answer(
    launcher: &ProcessLauncher,
    runtime: &Path,
    scripts_dir: &Path,
    storage: StorageTarget<'_>,
    course: &str,
    question: &str,
) -> Result<Answer, IngestError> {
    let script = scripts_dir.join(PipelineScripts::ANSWER);
    let spec = LaunchSpec::new(runtime, answer_args(&script, storage, course, question));
    let payload = launcher.run_blocking(&spec)?;
    Ok(answer_from_payload(payload))
}

/// `payload.courses` when it is an array, else nothing.
pub fn courses_from_payload(payload: &Value) -> Vec<Value> {
    payload
        .get("courses")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub fn answer_from_payload(payload: Value) -> Answer {
    match payload.get("error") {
        None | Some(Value::Null) => Answer::Found(payload),
        Some(Value::String(msg)) => Answer::Rejected(msg.clone()),
        Some(other) => Answer::Rejected(other.to_string()),
    }
}

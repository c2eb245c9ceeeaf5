//! Subcommand handlers.

use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde_json::json;
use std::path::Path;

use crate::Settings;
use crate::engine::progress::{RunEnd, RunProgress};
use crate::orchestrator::{IngestOutcome, Orchestrator, RunStream, UploadRequest, UploadedFile};
use crate::server::response::{ApiResponse, answer_response, courses_response};

pub fn handle_serve(settings: Settings) -> Result<()> {
    crate::server::serve(Orchestrator::from_settings(settings))
}

pub fn handle_ingest(
    settings: Settings,
    video: &Path,
    title: &str,
    number: &str,
    course: Option<&str>,
) -> Result<()> {
    let data = std::fs::read(video).with_context(|| format!("read {}", video.display()))?;
    let app = Orchestrator::from_settings(settings);
    let request = UploadRequest {
        video: Some(UploadedFile {
            file_name: video.file_name().and_then(|n| n.to_str()),
            data: &data,
        }),
        title: Some(title.to_string()),
        number: Some(number.to_string()),
        course: course.map(str::to_string),
    };
    let outcome = app.ingest(request)?;
    drop(data);

    match outcome {
        IngestOutcome::Completed { run, result } => {
            info!("run {}: completed", run.id);
            print_json(&json!({ "run_id": run.id, "result": result }))
        }
        IngestOutcome::Started { run, pid } => {
            info!("run {}: running in background (pid {})", run.id, pid);
            Ok(())
        }
        IngestOutcome::Streaming(stream) => follow(stream),
    }
}

/// Drain a streaming run onto a progress bar. Ctrl-C terminates the pipeline's process group.
fn follow(stream: RunStream) -> Result<()> {
    let run_id = stream.run().id.clone();
    if let Some(terminator) = stream.terminator()
        && let Err(e) = ctrlc::set_handler(move || {
            if terminator.terminate() {
                warn!("Interrupted; stopping pipeline (pid {})", terminator.pid());
            }
        })
    {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut progress = RunProgress::new();
    for event in stream {
        progress.apply(&event);
    }
    match progress.finish() {
        RunEnd::Done => {
            info!("run {}: done", run_id);
            Ok(())
        }
        RunEnd::Failed(msg) => bail!("run {run_id} failed: {msg}"),
        RunEnd::Closed => bail!("run {run_id}: stream ended without a result"),
    }
}

pub fn handle_courses(settings: Settings) -> Result<()> {
    let app = Orchestrator::from_settings(settings);
    print_response(courses_response(app.list_courses()))
}

pub fn handle_ask(settings: Settings, course: &str, question: &str) -> Result<()> {
    let app = Orchestrator::from_settings(settings);
    print_response(answer_response(app.answer(course, question)))
}

/// Print a JSON response body; a failure status becomes the command's error.
fn print_response(response: ApiResponse) -> Result<()> {
    let Some(body) = response.json_body() else {
        bail!("unexpected streaming response");
    };
    if response.status >= 400 {
        let msg = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("request failed");
        bail!("{} ({})", msg, response.status);
    }
    print_json(body)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

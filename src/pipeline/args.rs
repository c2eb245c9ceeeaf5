//! Argument vectors for the pipeline scripts. Pure: no I/O, same input gives the same vector.
//!
//! The argument list is the only channel through which a run's configuration reaches the
//! pipeline, so every mode launches with exactly what these functions return.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::UploadRun;

/// Connection string plus sanitized database name.
#[derive(Clone, Copy, Debug)]
pub struct StorageTarget<'a> {
    pub uri: &'a str,
    pub database: &'a str,
}

/// Per-deployment knobs passed to the ingest script.
#[derive(Clone, Copy, Debug)]
pub struct IngestKnobs {
    pub merge_size: u32,
    /// Ask the pipeline to remove intermediate artifacts after a successful run.
    pub cleanup: bool,
}

/// Program, arguments and working directory of one pipeline invocation.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        LaunchSpec {
            program: program.into(),
            args,
            current_dir: None,
        }
    }

    /// Fresh `Command` with program, args and cwd set; stdio is left to the caller.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Program and script only; the full vector carries the storage credentials.
    pub fn describe(&self) -> String {
        match self.args.first() {
            Some(script) => format!(
                "{} {}",
                self.program.display(),
                Path::new(script).display()
            ),
            None => self.program.display().to_string(),
        }
    }
}

fn push_flag(args: &mut Vec<OsString>, flag: &str, value: impl Into<OsString>) {
    args.push(flag.into());
    args.push(value.into());
}

/// Arguments for the ingest script of `run`.
pub fn ingest_args(
    script: &Path,
    run: &UploadRun,
    storage: StorageTarget<'_>,
    knobs: IngestKnobs,
) -> Vec<OsString> {
    let ws = &run.workspace;
    let meta = &run.metadata;
    let mut args: Vec<OsString> = vec![script.into()];
    push_flag(&mut args, "--video-dir", &ws.video_dir);
    push_flag(&mut args, "--audio-dir", &ws.audio_dir);
    push_flag(&mut args, "--json-dir", &ws.transcript_dir);
    push_flag(&mut args, "--improved-json-dir", &ws.refined_dir);
    push_flag(&mut args, "--merge-size", knobs.merge_size.to_string());
    push_flag(&mut args, "--embeddings-output", &ws.embeddings_path);
    push_flag(&mut args, "--faiss-output", &ws.index_path);
    args.push("--overwrite-audio".into());
    if knobs.cleanup {
        args.push("--cleanup".into());
    }
    push_flag(&mut args, "--mongo-uri", storage.uri);
    push_flag(&mut args, "--mongo-db", storage.database);
    push_flag(&mut args, "--mongo-collection", &meta.collection);
    push_flag(&mut args, "--video-title", &meta.title);
    push_flag(&mut args, "--video-number", &meta.number);
    push_flag(
        &mut args,
        "--course-name",
        meta.course.as_deref().unwrap_or(""),
    );
    args
}

/// Arguments for the course listing script.
pub fn list_courses_args(script: &Path, storage: StorageTarget<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![script.into()];
    push_flag(&mut args, "--mongo-uri", storage.uri);
    push_flag(&mut args, "--mongo-db", storage.database);
    args
}

/// Arguments for the question answering script.
pub fn answer_args(
    script: &Path,
    storage: StorageTarget<'_>,
    course: &str,
    question: &str,
) -> Vec<OsString> {
    let mut args = list_courses_args(script, storage);
    push_flag(&mut args, "--course", course);
    push_flag(&mut args, "--question", question);
    args
}

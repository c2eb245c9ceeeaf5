//! Public types for the lectern API: settings, runs, workspaces and progress events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::IngestError;
use crate::utils::config::{
    DEFAULT_MERGE_SIZE, ProbeConsts, ServerDefaults, StorageDefaults, WorkspaceLayout,
};

/// How the launcher treats the pipeline's output. Fixed for the lifetime of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Wait for exit and return the parsed standard output.
    Blocking,
    /// Relay output as newline-delimited progress events until exit.
    #[default]
    Streaming,
    /// Start the pipeline and return immediately; its outcome is not observed.
    Detached,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Blocking => "blocking",
            RunMode::Streaming => "streaming",
            RunMode::Detached => "detached",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(RunMode::Blocking),
            "streaming" => Ok(RunMode::Streaming),
            "detached" => Ok(RunMode::Detached),
            other => Err(format!(
                "unknown run mode '{other}' (expected blocking, streaming or detached)"
            )),
        }
    }
}

/// Lifecycle of an [`UploadRun`].
///
/// `Created → Uploaded → Launched → (Streaming | Waiting) → Completed | Failed`.
/// Any non-terminal state may also fail directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Created,
    Uploaded,
    Launched,
    Streaming,
    Waiting,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// True when `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Created, Uploaded) => true,
            (Uploaded, Launched) => true,
            (Launched, Streaming | Waiting) => true,
            (Streaming | Waiting, Completed) => true,
            _ => false,
        }
    }
}

/// Absolute paths of one run's isolated directory tree. Everything lives under `root`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub video_dir: PathBuf,
    pub audio_dir: PathBuf,
    /// Raw transcripts straight out of speech-to-text.
    pub transcript_dir: PathBuf,
    /// Transcripts after segment merging.
    pub refined_dir: PathBuf,
    pub embeddings_path: PathBuf,
    pub index_path: PathBuf,
}

impl Workspace {
    /// Lay out (without creating) the tree for a run rooted at `root`.
    pub fn under(root: &Path) -> Self {
        Workspace {
            root: root.to_path_buf(),
            video_dir: root.join(WorkspaceLayout::VIDEO_DIR),
            audio_dir: root.join(WorkspaceLayout::AUDIO_DIR),
            transcript_dir: root.join(WorkspaceLayout::TRANSCRIPT_DIR),
            refined_dir: root.join(WorkspaceLayout::REFINED_DIR),
            embeddings_path: root.join(WorkspaceLayout::EMBEDDINGS_FILE),
            index_path: root.join(WorkspaceLayout::INDEX_FILE),
        }
    }

    /// Directories that must exist before the run is ready.
    pub fn directories(&self) -> [&Path; 4] {
        [
            &self.video_dir,
            &self.audio_dir,
            &self.transcript_dir,
            &self.refined_dir,
        ]
    }
}

/// Caller-supplied and derived metadata for one upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunMetadata {
    pub title: String,
    pub number: String,
    pub course: Option<String>,
    pub safe_title: String,
    /// Sanitized storage database name.
    pub database: String,
    /// Sanitized storage collection name.
    pub collection: String,
    /// Extension of the uploaded file including the dot (`.mp4` when the upload had none).
    pub extension: String,
}

/// One ingestion request from upload to pipeline exit.
#[derive(Clone, Debug)]
pub struct UploadRun {
    pub id: String,
    pub workspace: Workspace,
    pub metadata: RunMetadata,
    pub mode: RunMode,
    state: RunState,
}

impl UploadRun {
    pub fn new(id: String, workspace: Workspace, metadata: RunMetadata, mode: RunMode) -> Self {
        UploadRun {
            id,
            workspace,
            metadata,
            mode,
            state: RunState::Created,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`, rejecting transitions out of terminal states or that skip a step.
    pub fn transition(&mut self, next: RunState) -> Result<(), IngestError> {
        if !self.state.can_transition_to(next) {
            return Err(IngestError::InvalidTransition {
                run_id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        log::debug!("run {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Kind tag of a [`ProgressEvent`] (`type` on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Progress,
    Log,
    Error,
    Done,
}

/// One line of the progress stream.
///
/// Fields the pipeline sends beyond the known ones are kept in `extra`. Events parsed from a
/// pipeline line also keep that line, and [`ProgressEvent::to_line`] forwards it byte for byte.
/// Equality ignores the kept line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Fraction in `[0.0, 1.0]`. Not validated; forwarded as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    raw: Option<String>,
}

impl PartialEq for ProgressEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.step == other.step
            && self.progress == other.progress
            && self.message == other.message
            && self.eta_seconds == other.eta_seconds
            && self.extra == other.extra
    }
}

impl ProgressEvent {
    pub fn new(kind: EventKind) -> Self {
        ProgressEvent {
            kind,
            step: None,
            progress: None,
            message: None,
            eta_seconds: None,
            extra: Map::new(),
            raw: None,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::new(EventKind::Log).with_message(message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error).with_message(message)
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self::new(EventKind::Done).with_message(message)
    }

    pub fn status(step: impl Into<String>, progress: f64, message: impl Into<String>) -> Self {
        Self::new(EventKind::Status)
            .with_step(step)
            .with_progress(progress)
            .with_message(message)
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Parse one pipeline line, keeping its text for verbatim forwarding.
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        let mut event: ProgressEvent = serde_json::from_str(line)?;
        event.raw = Some(line.trim().to_string());
        Ok(event)
    }

    /// The pipeline line this event was parsed from, if any.
    pub fn raw_line(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// One NDJSON line, newline included. Parsed events are forwarded as received.
    pub fn to_line(&self) -> String {
        if let Some(raw) = &self.raw {
            return format!("{raw}\n");
        }
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"unserializable event: {e}"}}"#)
        });
        line.push('\n');
        line
    }
}

/// Full runtime configuration. Built from defaults, `lectern.toml`, the environment and CLI flags,
/// in that order of precedence.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Address the HTTP service listens on.
    pub bind: String,
    /// HTTP worker threads.
    pub workers: usize,
    /// Directory under which each run gets its own `<id>/` tree.
    pub runs_dir: PathBuf,
    /// Directory holding the pipeline scripts.
    pub scripts_dir: PathBuf,
    /// Explicit runtime executable; skips probing when set.
    pub python_bin: Option<String>,
    /// Storage connection string. Required for every pipeline call.
    pub mongo_uri: Option<String>,
    pub mongo_db: String,
    pub mongo_collection: String,
    pub mode: RunMode,
    pub merge_size: u32,
    /// Ask the pipeline to delete intermediate artifacts after success.
    pub cleanup: bool,
    pub max_upload_bytes: u64,
    pub probe_timeout: Duration,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind: ServerDefaults::BIND.to_string(),
            workers: ServerDefaults::WORKERS,
            runs_dir: PathBuf::from(ServerDefaults::RUNS_DIR),
            scripts_dir: PathBuf::from(ServerDefaults::SCRIPTS_DIR),
            python_bin: None,
            mongo_uri: None,
            mongo_db: StorageDefaults::DATABASE.to_string(),
            mongo_collection: StorageDefaults::COLLECTION.to_string(),
            mode: RunMode::default(),
            merge_size: DEFAULT_MERGE_SIZE,
            cleanup: false,
            max_upload_bytes: ServerDefaults::MAX_UPLOAD_BYTES,
            probe_timeout: ProbeConsts::TIMEOUT,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sticky() {
        for next in [
            RunState::Created,
            RunState::Launched,
            RunState::Completed,
            RunState::Failed,
        ] {
            assert!(!RunState::Completed.can_transition_to(next));
            assert!(!RunState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn happy_path_transitions() {
        let ws = Workspace::under(Path::new("/tmp/run"));
        let meta = RunMetadata {
            title: "t".into(),
            number: "1".into(),
            course: None,
            safe_title: "t".into(),
            database: "rag_basic".into(),
            collection: "video_embeddings".into(),
            extension: ".mp4".into(),
        };
        let mut run = UploadRun::new("id".into(), ws, meta, RunMode::Streaming);
        run.transition(RunState::Uploaded).unwrap();
        run.transition(RunState::Launched).unwrap();
        run.transition(RunState::Streaming).unwrap();
        run.transition(RunState::Completed).unwrap();
        assert!(run.transition(RunState::Failed).is_err());
        assert_eq!(run.state(), RunState::Completed);
    }

    #[test]
    fn cannot_skip_upload() {
        assert!(!RunState::Created.can_transition_to(RunState::Launched));
        assert!(RunState::Created.can_transition_to(RunState::Failed));
    }

    #[test]
    fn run_mode_parses_case_insensitively() {
        assert_eq!("Detached".parse::<RunMode>(), Ok(RunMode::Detached));
        assert!("later".parse::<RunMode>().is_err());
    }
}

//! Application configuration constants.
//! Defaults, wire constants and tuning in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!("{pkg}.toml"),
            }
        })
    }

    /// File read from the working directory for layered settings (`lectern.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Server ----

pub struct ServerDefaults;

impl ServerDefaults {
    pub const BIND: &'static str = "127.0.0.1:3000";
    pub const WORKERS: usize = 4;
    pub const RUNS_DIR: &'static str = "backend/runs";
    pub const SCRIPTS_DIR: &'static str = "backend";
    /// Largest accepted upload body (bytes). 2 GiB.
    pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;
}

// ---- Storage ----

pub struct StorageDefaults;

impl StorageDefaults {
    /// Fallback database name; also what the sanitizer returns for empty input.
    pub const DATABASE: &'static str = "rag_basic";
    pub const COLLECTION: &'static str = "video_embeddings";
    /// Per-course collections are named `{COURSE_PREFIX}{sanitized course}`.
    pub const COURSE_PREFIX: &'static str = "course_embeddings_";
}

// ---- Pipeline scripts ----

pub struct PipelineScripts;

impl PipelineScripts {
    pub const PROCESS: &'static str = "process_videos.py";
    pub const LIST_COURSES: &'static str = "list_courses.py";
    pub const ANSWER: &'static str = "answer_question.py";
}

/// Segments merged per chunk by the pipeline.
pub const DEFAULT_MERGE_SIZE: u32 = 5;

// ---- Workspace layout ----

/// Names of the entries created under each run's root directory.
pub struct WorkspaceLayout;

impl WorkspaceLayout {
    pub const VIDEO_DIR: &'static str = "videos";
    pub const AUDIO_DIR: &'static str = "audio";
    pub const TRANSCRIPT_DIR: &'static str = "jsons";
    pub const REFINED_DIR: &'static str = "new_jsons";
    pub const EMBEDDINGS_FILE: &'static str = "embeddings.joblib";
    pub const INDEX_FILE: &'static str = "faiss_index.bin";
    /// Extension used when the uploaded file has none.
    pub const DEFAULT_EXTENSION: &'static str = ".mp4";
    /// Attempts at drawing a fresh run id before giving up.
    pub const MAX_ID_ATTEMPTS: usize = 4;
}

// ---- Runtime probing ----

pub struct ProbeConsts;

impl ProbeConsts {
    pub const VERSION_ARG: &'static str = "--version";
    /// Upper bound on a single candidate probe.
    pub const TIMEOUT: Duration = Duration::from_secs(3);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
}

/// Candidate runtime executables in probe order for this platform.
pub fn runtime_candidates() -> Vec<String> {
    let names: &[&str] = if cfg!(windows) {
        &["python", "python3"]
    } else {
        &["python3", "python"]
    };
    names.iter().map(|s| s.to_string()).collect()
}

// ---- Streaming relay ----

/// Relay buffering and synthetic event tuning.
pub struct StreamConsts;

impl StreamConsts {
    /// Event channel capacity between pipe readers and the consumer. Bounded so a slow client
    /// pushes back on the child instead of growing memory.
    pub const EVENT_CHANNEL_CAP: usize = 1024;
    /// Bytes requested per pipe read.
    pub const READ_CHUNK_SIZE: usize = 8 * 1024;
    /// Progress fraction reported by the synthetic upload-complete event.
    pub const INITIAL_PROGRESS: f64 = 0.05;
    pub const UPLOAD_STEP: &'static str = "upload";
    /// How often the supervisor polls for exit once both pipes are closed.
    pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);
}

// ---- Response messages ----

pub struct Messages;

impl Messages {
    pub const UPLOAD_COMPLETE: &'static str = "Upload complete. Starting processing pipeline.";
    pub const PIPELINE_DONE: &'static str = "Processing completed.";
    pub const INGEST_COMPLETE: &'static str =
        "Transcription, chunking, embedding, and MongoDB storage completed.";
    pub const INGEST_STARTED: &'static str = "Upload received. Processing started in the background.";
    pub const MISSING_FIELDS: &'static str = "Video file, title, and number are required.";
    pub const INVALID_VIDEO: &'static str = "Invalid video upload.";
    pub const MISSING_STORAGE: &'static str = "Missing MONGODB_URI environment variable.";
    pub const MISSING_QUERY_FIELDS: &'static str = "Question and course are required.";
    pub const COURSES_FAILED: &'static str = "Failed to load courses.";
    pub const COURSES_INVALID: &'static str = "Invalid response while loading courses.";
    pub const ANSWER_FAILED: &'static str = "Failed to process question.";
    pub const ANSWER_INVALID: &'static str = "Invalid response while answering question.";
}

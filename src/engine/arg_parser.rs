use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::RunMode;

/// Lecture video ingestion service.
#[derive(Clone, Debug, Parser)]
#[command(name = "lectern", version)]
#[command(about = "Upload lecture videos into the transcription/embedding pipeline and query the result.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (POST /videos, GET /courses, POST /student-query).
    Serve {
        /// Listen address, e.g. 127.0.0.1:3000.
        #[arg(long, short)]
        bind: Option<String>,

        /// HTTP worker threads.
        #[arg(long, short)]
        workers: Option<usize>,

        /// Largest accepted request body in bytes.
        #[arg(long)]
        max_upload_bytes: Option<u64>,
    },

    /// Run one video through the pipeline without the HTTP layer.
    Ingest {
        /// Video file to ingest.
        #[arg(value_name = "VIDEO")]
        video: PathBuf,

        /// Lecture title.
        #[arg(long, short)]
        title: String,

        /// Lecture number within the course.
        #[arg(long, short)]
        number: String,

        /// Course the lecture belongs to.
        #[arg(long, short)]
        course: Option<String>,
    },

    /// List the courses that have stored embeddings.
    Courses,

    /// Ask a question against one course.
    Ask {
        #[arg(long, short)]
        course: String,

        #[arg(value_name = "QUESTION")]
        question: String,
    },
}

/// Flags shared by every subcommand. Override `lectern.toml` and the environment.
#[derive(Clone, Debug, Default, Args)]
pub struct CommonArgs {
    /// Verbose output.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Directory holding `lectern.toml` and `.env`. Default: current directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// How the pipeline's output is handled.
    #[arg(long, short = 'm', global = true, value_enum)]
    pub mode: Option<RunMode>,

    /// Root directory for per-run workspaces.
    #[arg(long, global = true)]
    pub runs_dir: Option<PathBuf>,

    /// Directory containing the pipeline scripts.
    #[arg(long, global = true)]
    pub scripts_dir: Option<PathBuf>,

    /// Runtime executable; skips probing for python3/python.
    #[arg(long, global = true)]
    pub python_bin: Option<String>,

    /// Storage database name (sanitized before use).
    #[arg(long, global = true)]
    pub mongo_db: Option<String>,

    /// Default storage collection for uploads without a course.
    #[arg(long, global = true)]
    pub mongo_collection: Option<String>,

    /// Segments merged per transcript chunk.
    #[arg(long, global = true)]
    pub merge_size: Option<u32>,

    /// Remove intermediate artifacts after a successful run.
    #[arg(long, global = true)]
    pub cleanup: bool,
}

//! Lectern: lecture video ingestion in front of an external transcription/embedding pipeline.
//!
//! An upload gets its own workspace, the pipeline runs as a child process, and its output comes
//! back as a parsed document, a live NDJSON event stream, or not at all, depending on
//! [`RunMode`].

pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod runtime;
pub mod sanitize;
pub mod server;
pub mod types;
pub mod utils;
pub mod workspace;

/// Re-export types for API
pub use types::*;

pub use error::IngestError;
pub use orchestrator::{IngestOutcome, Orchestrator, RunStream, UploadRequest, UploadedFile};
pub use runtime::{CachedLocator, FixedLocator, ProbingLocator, RuntimeLocator};

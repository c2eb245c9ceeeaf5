//! Pipeline components: argument vectors, launcher, line framing, streaming relay, queries.

pub mod args;
pub mod framer;
pub mod launcher;
pub mod query;
pub mod relay;

pub use args::{
    IngestKnobs, LaunchSpec, StorageTarget, answer_args, ingest_args, list_courses_args,
};
pub use framer::{LineFramer, stderr_event, stdout_event};
pub use launcher::{Launched, OutputStrategy, ProcessLauncher, parse_document};
pub use query::{Answer, answer_from_payload, courses_from_payload};
pub use relay::{EventStream, RunTerminator, spawn_relay};

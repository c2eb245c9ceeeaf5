//! Error taxonomy for ingestion runs and the pipeline queries.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::RunState;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or malformed request fields. Raised before anything touches disk.
    #[error("{0}")]
    Validation(String),

    /// Missing storage connection string or similar deployment problem.
    #[error("{0}")]
    Configuration(String),

    /// No runtime executable could be resolved.
    #[error("Python runtime unavailable.")]
    RuntimeUnavailable { searched: Vec<String> },

    /// The pipeline could not be started at all.
    #[error("failed to start pipeline: {0}")]
    Spawn(#[source] io::Error),

    /// The pipeline exited nonzero. `diagnostic` is its trimmed stderr, or stdout when stderr was empty.
    #[error("{}", process_message(.code, .diagnostic))]
    Process {
        code: Option<i32>,
        diagnostic: String,
    },

    /// The pipeline exited cleanly but its output was not what the caller expects.
    #[error("invalid pipeline output: {0}")]
    Protocol(String),

    #[error("{}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("run {run_id}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        run_id: String,
        from: RunState,
        to: RunState,
    },
}

fn process_message(code: &Option<i32>, diagnostic: &str) -> String {
    if !diagnostic.is_empty() {
        return diagnostic.to_string();
    }
    match code {
        Some(code) => format!("Process exited with code {code}"),
        None => "Process terminated by signal".to_string(),
    }
}

impl IngestError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Configuration failures, including an unresolvable runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            IngestError::Configuration(_) | IngestError::RuntimeUnavailable { .. }
        )
    }

    /// HTTP status the caller should see for this failure.
    pub fn status(&self) -> u16 {
        match self {
            IngestError::Validation(_) => 400,
            IngestError::PayloadTooLarge { .. } => 413,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_falls_back_to_exit_code() {
        let e = IngestError::Process {
            code: Some(2),
            diagnostic: String::new(),
        };
        assert_eq!(e.to_string(), "Process exited with code 2");
        let e = IngestError::Process {
            code: Some(1),
            diagnostic: "Traceback: boom".into(),
        };
        assert_eq!(e.to_string(), "Traceback: boom");
    }

    #[test]
    fn runtime_unavailable_is_configuration() {
        let e = IngestError::RuntimeUnavailable {
            searched: vec!["python3".into()],
        };
        assert!(e.is_configuration());
        assert_eq!(e.status(), 500);
        assert_eq!(IngestError::Validation("x".into()).status(), 400);
    }
}

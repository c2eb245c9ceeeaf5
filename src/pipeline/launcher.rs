//! One launcher, three output strategies.
//!
//! | mode      | strategy       | stdout/stderr        | returns                  |
//! |-----------|----------------|----------------------|--------------------------|
//! | blocking  | `CaptureWhole` | captured in memory   | parsed JSON document     |
//! | streaming | `LineRelay`    | piped, line-framed   | [`EventStream`]          |
//! | detached  | `Discard`      | `/dev/null`          | pid, outcome unobserved  |

use log::{info, warn};
use serde_json::{Map, Value};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::IngestError;
use crate::pipeline::args::LaunchSpec;
use crate::pipeline::relay::{EventStream, spawn_relay};
use crate::types::RunMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStrategy {
    Discard,
    CaptureWhole,
    LineRelay,
}

impl From<RunMode> for OutputStrategy {
    fn from(mode: RunMode) -> Self {
        match mode {
            RunMode::Blocking => OutputStrategy::CaptureWhole,
            RunMode::Streaming => OutputStrategy::LineRelay,
            RunMode::Detached => OutputStrategy::Discard,
        }
    }
}

/// What a launch produced, by strategy.
pub enum Launched {
    Completed(Value),
    Streaming(EventStream),
    Detached { pid: u32 },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn launch(
        &self,
        spec: &LaunchSpec,
        strategy: OutputStrategy,
        run_id: &str,
    ) -> Result<Launched, IngestError> {
        info!("run {}: launching {} ({:?})", run_id, spec.describe(), strategy);
        match strategy {
            OutputStrategy::CaptureWhole => run_captured(spec).map(Launched::Completed),
            OutputStrategy::LineRelay => Ok(Launched::Streaming(spawn_relay(spec, run_id))),
            OutputStrategy::Discard => spawn_detached(spec, run_id).map(|pid| Launched::Detached { pid }),
        }
    }

    /// Blocking launch returning the parsed document directly.
    pub fn run_blocking(&self, spec: &LaunchSpec) -> Result<Value, IngestError> {
        run_captured(spec)
    }
}

/// Wait for exit with both streams captured. Exit 0 → stdout parsed as one JSON document.
fn run_captured(spec: &LaunchSpec) -> Result<Value, IngestError> {
    let output = spec
        .command()
        .stdin(Stdio::null())
        .output()
        .map_err(IngestError::Spawn)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        return Err(IngestError::Process {
            code: output.status.code(),
            diagnostic,
        });
    }
    parse_document(&output.stdout)
}

/// Parse captured stdout. Empty output counts as `{}`.
pub fn parse_document(stdout: &[u8]) -> Result<Value, IngestError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(text).map_err(|e| IngestError::Protocol(e.to_string()))
}

/// Start with all output discarded, outside our process group, and hand the child to a reaper
/// thread. The caller gets the pid and nothing else.
fn spawn_detached(spec: &LaunchSpec, run_id: &str) -> Result<u32, IngestError> {
    let mut cmd = spec.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    own_process_group(&mut cmd);
    let mut child = cmd.spawn().map_err(IngestError::Spawn)?;
    let pid = child.id();
    let run_id = run_id.to_string();
    thread::spawn(move || match child.wait() {
        Ok(status) => info!("run {}: detached pipeline (pid {}) exited: {}", run_id, pid, status),
        Err(e) => warn!("run {}: detached pipeline (pid {}) wait failed: {}", run_id, pid, e),
    });
    Ok(pid)
}

/// Put the child in its own process group so signals aimed at ours (Ctrl-C) do not reach it
/// and the whole pipeline tree can be signalled as one.
#[cfg(unix)]
pub(crate) fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
pub(crate) fn own_process_group(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn own_process_group(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stdout_is_empty_object() {
        assert_eq!(parse_document(b"  \n").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn garbage_stdout_is_protocol_error() {
        assert!(matches!(
            parse_document(b"not json"),
            Err(IngestError::Protocol(_))
        ));
    }
}

//! Bounded `--version` probes for runtime candidates.

use log::debug;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::utils::config::ProbeConsts;

/// Outcome of probing one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Ran and exited 0.
    Available,
    /// Ran and exited nonzero.
    Failed,
    /// Could not be started (not found, not executable).
    Missing,
    /// Still running at the deadline; killed.
    TimedOut,
}

/// Run `program --version` with all output discarded and wait at most `timeout` for it.
pub fn probe_candidate(program: &str, timeout: Duration) -> ProbeOutcome {
    let mut child = match Command::new(program)
        .arg(ProbeConsts::VERSION_ARG)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            debug!("probe {}: {}", program, e);
            return ProbeOutcome::Missing;
        }
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return ProbeOutcome::Available,
            Ok(Some(status)) => {
                debug!("probe {}: exited with {}", program, status);
                return ProbeOutcome::Failed;
            }
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                debug!("probe {}: no answer within {:?}", program, timeout);
                return ProbeOutcome::TimedOut;
            }
            Ok(None) => thread::sleep(ProbeConsts::POLL_INTERVAL),
            Err(e) => {
                debug!("probe {}: wait failed: {}", program, e);
                let _ = child.kill();
                return ProbeOutcome::Failed;
            }
        }
    }
}

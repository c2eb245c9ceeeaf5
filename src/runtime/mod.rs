//! Runtime resolution: which executable launches the pipeline scripts.
//!
//! The orchestrator only sees the [`RuntimeLocator`] trait. [`ProbingLocator`] is the real
//! implementation (configured override, else first candidate whose `--version` probe succeeds);
//! [`CachedLocator`] wraps any locator so the answer is computed once per process.

pub mod probe;

use log::{debug, info};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::Settings;
use crate::error::IngestError;
use crate::utils::config::runtime_candidates;

pub use probe::{ProbeOutcome, probe_candidate};

/// Source of the executable used to run pipeline scripts.
pub trait RuntimeLocator: Send + Sync {
    fn locate(&self) -> Result<PathBuf, IngestError>;
}

impl<L: RuntimeLocator + ?Sized> RuntimeLocator for std::sync::Arc<L> {
    fn locate(&self) -> Result<PathBuf, IngestError> {
        (**self).locate()
    }
}

/// Configured override first, then the platform candidates in order.
#[derive(Clone, Debug)]
pub struct ProbingLocator {
    override_bin: Option<String>,
    candidates: Vec<String>,
    probe_timeout: Duration,
}

impl ProbingLocator {
    pub fn new(override_bin: Option<String>, candidates: Vec<String>, probe_timeout: Duration) -> Self {
        ProbingLocator {
            override_bin,
            candidates,
            probe_timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.python_bin.clone(),
            runtime_candidates(),
            settings.probe_timeout,
        )
    }
}

impl RuntimeLocator for ProbingLocator {
    fn locate(&self) -> Result<PathBuf, IngestError> {
        if let Some(bin) = self.override_bin.as_deref().map(str::trim)
            && !bin.is_empty()
        {
            debug!("Runtime override: {}", bin);
            return Ok(PathBuf::from(bin));
        }
        for candidate in &self.candidates {
            match probe_candidate(candidate, self.probe_timeout) {
                ProbeOutcome::Available => {
                    info!("Using runtime {}", candidate);
                    return Ok(PathBuf::from(candidate));
                }
                outcome => debug!("Runtime candidate {} rejected: {:?}", candidate, outcome),
            }
        }
        Err(IngestError::RuntimeUnavailable {
            searched: self.candidates.clone(),
        })
    }
}

/// Resolves once, then hands out the same answer. Failures are not cached so a runtime
/// installed after startup is picked up on the next request.
pub struct CachedLocator<L> {
    inner: L,
    resolved: OnceLock<PathBuf>,
}

impl<L: RuntimeLocator> CachedLocator<L> {
    pub fn new(inner: L) -> Self {
        CachedLocator {
            inner,
            resolved: OnceLock::new(),
        }
    }
}

impl<L: RuntimeLocator> RuntimeLocator for CachedLocator<L> {
    fn locate(&self) -> Result<PathBuf, IngestError> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.clone());
        }
        let path = self.inner.locate()?;
        Ok(self.resolved.get_or_init(|| path).clone())
    }
}

/// Always returns the same path. For tests and for callers that resolved the runtime themselves.
#[derive(Clone, Debug)]
pub struct FixedLocator(pub PathBuf);

impl RuntimeLocator for FixedLocator {
    fn locate(&self) -> Result<PathBuf, IngestError> {
        Ok(self.0.clone())
    }
}

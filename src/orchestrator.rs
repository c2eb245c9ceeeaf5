//! Ingestion orchestration: validate → resolve runtime → allocate workspace → store upload → launch.
//!
//! Validation and configuration problems are reported before any directory is created or any
//! process started. Everything after workspace allocation belongs to one [`UploadRun`] whose
//! state follows the launch outcome.

use log::{info, warn};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::IngestError;
use crate::pipeline::args::{IngestKnobs, LaunchSpec, StorageTarget, ingest_args};
use crate::pipeline::launcher::{Launched, ProcessLauncher};
use crate::pipeline::query::{self, Answer};
use crate::pipeline::relay::{EventStream, RunTerminator};
use crate::runtime::{CachedLocator, ProbingLocator, RuntimeLocator};
use crate::sanitize::{
    collection_name, sanitize_database_name, sanitize_title, upload_extension, video_file_name,
};
use crate::types::{EventKind, ProgressEvent, RunMetadata, RunState, Settings, UploadRun};
use crate::utils::config::{Messages, PipelineScripts};
use crate::workspace::{WorkspaceManager, store_video};

/// The uploaded video: client-side file name (if any) and its bytes.
#[derive(Clone, Copy, Debug)]
pub struct UploadedFile<'a> {
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

/// Fields of one ingestion request, as received. Nothing is validated yet.
#[derive(Clone, Debug, Default)]
pub struct UploadRequest<'a> {
    pub video: Option<UploadedFile<'a>>,
    pub title: Option<String>,
    pub number: Option<String>,
    pub course: Option<String>,
}

/// A started run and what its launch produced.
pub enum IngestOutcome {
    /// Blocking mode: the pipeline finished and printed `result`.
    Completed { run: UploadRun, result: Value },
    /// Streaming mode: drain the stream to follow the run.
    Streaming(RunStream),
    /// Detached mode: running unobserved as `pid`.
    Started { run: UploadRun, pid: u32 },
}

impl IngestOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            IngestOutcome::Completed { run, .. } | IngestOutcome::Started { run, .. } => &run.id,
            IngestOutcome::Streaming(stream) => &stream.run.id,
        }
    }
}

/// A streaming run's events. Moves the run to `Completed` or `Failed` when the stream closes,
/// according to the last event seen.
pub struct RunStream {
    run: UploadRun,
    events: EventStream,
    last: Option<EventKind>,
}

impl RunStream {
    pub fn run(&self) -> &UploadRun {
        &self.run
    }

    pub fn terminator(&self) -> Option<RunTerminator> {
        self.events.terminator()
    }
}

impl Iterator for RunStream {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        match self.events.next() {
            Some(event) => {
                self.last = Some(event.kind);
                Some(event)
            }
            None => {
                if !self.run.state().is_terminal() {
                    let next = match self.last {
                        Some(EventKind::Done) => RunState::Completed,
                        _ => RunState::Failed,
                    };
                    if let Err(e) = self.run.transition(next) {
                        warn!("{}", e);
                    }
                    info!("run {}: stream closed ({:?})", self.run.id, next);
                }
                None
            }
        }
    }
}

pub struct Orchestrator {
    settings: Settings,
    locator: Arc<dyn RuntimeLocator>,
    workspaces: WorkspaceManager,
    launcher: ProcessLauncher,
}

impl Orchestrator {
    pub fn new(settings: Settings, locator: Arc<dyn RuntimeLocator>) -> Self {
        let workspaces = WorkspaceManager::new(&settings.runs_dir);
        Orchestrator {
            settings,
            locator,
            workspaces,
            launcher: ProcessLauncher,
        }
    }

    /// Probing runtime resolution, cached for the life of the orchestrator.
    pub fn from_settings(settings: Settings) -> Self {
        let locator = CachedLocator::new(ProbingLocator::from_settings(&settings));
        Self::new(settings, Arc::new(locator))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one upload through the pipeline in the configured mode.
    pub fn ingest(&self, request: UploadRequest<'_>) -> Result<IngestOutcome, IngestError> {
        let (video, title, number) = match (
            request.video,
            non_blank(request.title.as_deref()),
            non_blank(request.number.as_deref()),
        ) {
            (Some(v), Some(t), Some(n)) => (v, t, n),
            _ => return Err(IngestError::Validation(Messages::MISSING_FIELDS.into())),
        };
        let uri = self.storage_uri()?;
        let runtime = self.locator.locate()?;

        let course = non_blank(request.course.as_deref());
        let metadata = RunMetadata {
            title: title.to_string(),
            number: number.to_string(),
            course: course.map(str::to_string),
            safe_title: sanitize_title(title),
            database: sanitize_database_name(&self.settings.mongo_db),
            collection: collection_name(course, &self.settings.mongo_collection),
            extension: upload_extension(video.file_name),
        };
        let mut run = self.workspaces.create_run(metadata, self.settings.mode)?;
        info!(
            "run {}: mode {}, runtime {}",
            run.id,
            run.mode,
            runtime.display()
        );

        let file_name = video_file_name(
            &run.metadata.number,
            &run.metadata.safe_title,
            &run.metadata.extension,
        );
        if let Err(e) = store_video(&run, &file_name, video.data) {
            fail(&mut run, &e);
            return Err(e);
        }
        run.transition(RunState::Uploaded)?;

        let spec = self.ingest_spec(runtime, &run, uri);
        run.transition(RunState::Launched)?;
        let launched = match self.launcher.launch(&spec, run.mode.into(), &run.id) {
            Ok(l) => l,
            Err(e) => {
                fail(&mut run, &e);
                return Err(e);
            }
        };
        match launched {
            Launched::Completed(result) => {
                run.transition(RunState::Waiting)?;
                run.transition(RunState::Completed)?;
                Ok(IngestOutcome::Completed { run, result })
            }
            Launched::Streaming(events) => {
                run.transition(RunState::Streaming)?;
                Ok(IngestOutcome::Streaming(RunStream {
                    run,
                    events,
                    last: None,
                }))
            }
            Launched::Detached { pid } => {
                run.transition(RunState::Waiting)?;
                info!("run {}: detached as pid {}", run.id, pid);
                Ok(IngestOutcome::Started { run, pid })
            }
        }
    }

    fn ingest_spec(&self, runtime: PathBuf, run: &UploadRun, uri: &str) -> LaunchSpec {
        let script = self.settings.scripts_dir.join(PipelineScripts::PROCESS);
        let storage = StorageTarget {
            uri,
            database: &run.metadata.database,
        };
        let knobs = IngestKnobs {
            merge_size: self.settings.merge_size,
            cleanup: self.settings.cleanup,
        };
        LaunchSpec::new(runtime, ingest_args(&script, run, storage, knobs))
    }

    /// Courses known to storage, via the listing script.
    pub fn list_courses(&self) -> Result<Vec<Value>, IngestError> {
        let uri = self.storage_uri()?;
        let runtime = self.locator.locate()?;
        let database = sanitize_database_name(&self.settings.mongo_db);
        query::list_courses(
            &self.launcher,
            &runtime,
            &self.settings.scripts_dir,
            StorageTarget {
                uri,
                database: &database,
            },
        )
    }

    /// Answer `question` against `course` through the answer script.
    pub fn answer(&self, course: &str, question: &str) -> Result<Answer, IngestError> {
        let (Some(course), Some(question)) = (non_blank(Some(course)), non_blank(Some(question)))
        else {
            return Err(IngestError::Validation(
                Messages::MISSING_QUERY_FIELDS.into(),
            ));
        };
        let uri = self.storage_uri()?;
        let runtime = self.locator.locate()?;
        let database = sanitize_database_name(&self.settings.mongo_db);
        query::answer(
            &self.launcher,
            &runtime,
            &self.settings.scripts_dir,
            StorageTarget {
                uri,
                database: &database,
            },
            course,
            question,
        )
    }

    fn storage_uri(&self) -> Result<&str, IngestError> {
        non_blank(self.settings.mongo_uri.as_deref())
            .ok_or_else(|| IngestError::Configuration(Messages::MISSING_STORAGE.into()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn fail(run: &mut UploadRun, error: &IngestError) {
    warn!("run {}: {}", run.id, error);
    if let Err(e) = run.transition(RunState::Failed) {
        warn!("{}", e);
    }
}

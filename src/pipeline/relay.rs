//! Streaming relay: child stdout/stderr → framed lines → one ordered event channel.
//!
//! Layout mirrors a small pipeline: one reader thread per pipe feeds a bounded channel, a
//! supervisor thread joins the readers, reaps the child and appends the terminal event. The
//! consumer holds the receiving end as an [`EventStream`]. The channel closes once, right after
//! the terminal event, when the last sender drops.

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, info, warn};
use std::io::{self, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::pipeline::args::LaunchSpec;
use crate::pipeline::framer::{LineFramer, stderr_event, stdout_event};
use crate::pipeline::launcher::own_process_group;
use crate::types::ProgressEvent;
use crate::utils::config::{Messages, StreamConsts};

/// Receiving end of a run's progress events. Iterate it to drain the run.
///
/// Dropping it before the stream has closed terminates the child's process group.
pub struct EventStream {
    rx: Receiver<ProgressEvent>,
    terminator: Option<RunTerminator>,
    closed: bool,
}

impl EventStream {
    /// A stream that yields `events` and closes. No process behind it.
    pub fn from_events(events: Vec<ProgressEvent>) -> Self {
        let (tx, rx) = bounded(events.len().max(1));
        for event in events {
            let _ = tx.send(event);
        }
        EventStream {
            rx,
            terminator: None,
            closed: false,
        }
    }

    /// Handle that can stop the run from another thread (e.g. a Ctrl-C handler).
    pub fn terminator(&self) -> Option<RunTerminator> {
        self.terminator.clone()
    }
}

impl Iterator for EventStream {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        if self.closed {
            return None;
        }
        match self.rx.recv() {
            Ok(event) => Some(event),
            Err(_) => {
                self.closed = true;
                None
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(t) = &self.terminator
            && t.terminate()
        {
            warn!(
                "Event stream dropped while pipeline (pid {}) was running; process group terminated",
                t.pid()
            );
        }
    }
}

/// Shared handle on a relayed child. Reaping only happens under the lock, so a pid seen as
/// running here is still ours to signal.
///
/// The group can outlive its leader: a background helper holding the pipes open keeps the
/// stream alive after the leader exits. Until both pipes reach EOF the group is still signalled.
#[derive(Clone)]
pub struct RunTerminator {
    child: Arc<Mutex<Child>>,
    pid: u32,
    drained: Arc<AtomicBool>,
}

impl RunTerminator {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// SIGTERM the child's process group while any member may still be running. Returns true
    /// when a signal was sent.
    pub fn terminate(&self) -> bool {
        let mut child = lock(&self.child);
        match child.try_wait() {
            Ok(None) => {
                signal_group(&mut child);
                true
            }
            // Leader reaped, pipes still open: a group member holds them. Its pgid stays
            // allocated while any member lives.
            Ok(Some(_)) if !self.drained.load(Ordering::SeqCst) => signal_orphaned_group(self.pid),
            _ => false,
        }
    }
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(unix)]
fn signal_group(child: &mut Child) {
    // The child leads its own group (see `own_process_group`), so its pid is the pgid.
    let pgid = child.id() as libc::pid_t;
    if unsafe { libc::killpg(pgid, libc::SIGTERM) } != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(unix)]
fn signal_orphaned_group(pgid: u32) -> bool {
    unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn signal_orphaned_group(_pgid: u32) -> bool {
    false
}

/// Start `spec` with both pipes captured and relay its output. Never fails: a spawn failure
/// becomes a single `error` event.
pub fn spawn_relay(spec: &LaunchSpec, run_id: &str) -> EventStream {
    let mut cmd = spec.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            warn!("run {}: could not start {}: {}", run_id, spec.describe(), e);
            return EventStream::from_events(vec![ProgressEvent::error(format!(
                "Failed to start pipeline: {e}"
            ))]);
        }
    };
    let pid = child.id();
    info!("run {}: pipeline started (pid {})", run_id, pid);

    let (tx, rx) = bounded::<ProgressEvent>(StreamConsts::EVENT_CHANNEL_CAP);
    let _ = tx.send(ProgressEvent::status(
        StreamConsts::UPLOAD_STEP,
        StreamConsts::INITIAL_PROGRESS,
        Messages::UPLOAD_COMPLETE,
    ));

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone(), stdout_event));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx.clone(), stderr_event));
    }

    let child = Arc::new(Mutex::new(child));
    let drained = Arc::new(AtomicBool::new(false));
    let terminator = RunTerminator {
        child: Arc::clone(&child),
        pid,
        drained: Arc::clone(&drained),
    };
    let run_id = run_id.to_string();
    thread::spawn(move || supervise(child, readers, drained, tx, run_id));

    EventStream {
        rx,
        terminator: Some(terminator),
        closed: false,
    }
}

/// Read `pipe` to EOF, framing lines and sending each as an event. Stops early when the
/// consumer is gone.
fn spawn_reader<R>(
    mut pipe: R,
    tx: Sender<ProgressEvent>,
    to_event: fn(&str) -> Option<ProgressEvent>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; StreamConsts::READ_CHUNK_SIZE];
        loop {
            let n = match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("pipe read failed: {}", e);
                    break;
                }
            };
            for line in framer.push(&buf[..n]) {
                if let Some(event) = to_event(&line)
                    && tx.send(event).is_err()
                {
                    debug!("consumer gone; reader stopping");
                    return;
                }
            }
        }
        if let Some(tail) = framer.finish()
            && let Some(event) = to_event(&tail)
        {
            let _ = tx.send(event);
        }
    })
}

/// Join readers, reap the child, emit the terminal event. Dropping `tx` here closes the stream.
fn supervise(
    child: Arc<Mutex<Child>>,
    readers: Vec<JoinHandle<()>>,
    drained: Arc<AtomicBool>,
    tx: Sender<ProgressEvent>,
    run_id: String,
) {
    for reader in readers {
        if reader.join().is_err() {
            warn!("run {}: pipe reader panicked", run_id);
        }
    }
    drained.store(true, Ordering::SeqCst);
    let terminal = match wait_for_exit(&child) {
        Ok(status) if status.success() => {
            info!("run {}: pipeline finished", run_id);
            ProgressEvent::done(Messages::PIPELINE_DONE)
        }
        Ok(status) => {
            warn!("run {}: pipeline failed ({})", run_id, status);
            match status.code() {
                Some(code) => ProgressEvent::error(format!("Pipeline exited with code {code}.")),
                None => ProgressEvent::error("Pipeline was terminated by a signal."),
            }
        }
        Err(e) => {
            warn!("run {}: wait failed: {}", run_id, e);
            ProgressEvent::error(format!("Failed to wait for pipeline: {e}"))
        }
    };
    let _ = tx.send(terminal);
}

/// Poll under the lock so [`RunTerminator`] never signals a reaped pid.
fn wait_for_exit(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        thread::sleep(StreamConsts::EXIT_POLL_INTERVAL);
    }
}

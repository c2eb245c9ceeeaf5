//! Terminal progress for a streaming run, driven by its events.

use kdam::{Animation, Bar, BarExt};
use log::warn;

use crate::types::{EventKind, ProgressEvent};

/// Bar resolution: event fractions in `[0, 1]` map onto `0..=SCALE`.
const SCALE: usize = 1000;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    pub fn new(total: usize, desc: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            animation,
        }
    }
}

pub fn create_progress_bar(config: ProgressBarConfig) -> Bar {
    kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation
    )
}

/// How a followed run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEnd {
    Done,
    Failed(String),
    /// Stream closed without a terminal event.
    Closed,
}

/// Renders events onto a bar: `status`/`progress` move it, `log` lines print above it.
pub struct RunProgress {
    bar: Bar,
    end: RunEnd,
}

impl RunProgress {
    pub fn new() -> Self {
        RunProgress {
            bar: create_progress_bar(ProgressBarConfig::new(SCALE, "starting", Animation::Classic)),
            end: RunEnd::Closed,
        }
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        if let Some(step) = &event.step {
            self.bar.set_description(step.clone());
        }
        match event.kind {
            EventKind::Status | EventKind::Progress => {
                if let Some(p) = event.progress {
                    let _ = self.bar.update_to(fraction_to_ticks(p));
                } else {
                    let _ = self.bar.refresh();
                }
                if event.kind == EventKind::Status
                    && let Some(msg) = &event.message
                {
                    let _ = self.bar.write(msg.clone());
                }
            }
            EventKind::Log => {
                if let Some(msg) = &event.message {
                    let _ = self.bar.write(msg.clone());
                }
            }
            EventKind::Error => {
                let msg = event.message.clone().unwrap_or_else(|| "pipeline error".into());
                warn!("{}", msg);
                self.end = RunEnd::Failed(msg);
            }
            EventKind::Done => {
                let _ = self.bar.update_to(SCALE);
                self.end = RunEnd::Done;
            }
        }
    }

    pub fn finish(mut self) -> RunEnd {
        let _ = self.bar.refresh();
        eprintln!();
        self.end
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn fraction_to_ticks(p: f64) -> usize {
    if p.is_nan() {
        return 0;
    }
    (p.clamp(0.0, 1.0) * SCALE as f64).round() as usize
}

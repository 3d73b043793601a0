// ABOUTME: Progress reporting for tracked provider actions
// ABOUTME: Observer trait plus a no-op observer and an indicatif multi-bar renderer

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Mutex;

use crate::cloud::models::{Action, ActionStatus};

/// One poll observation for one action of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionUpdate {
    /// Position of the action within its batch, starting at 0.
    pub index: usize,
    pub command: String,
    pub resource_id: Option<u64>,
    pub status: ActionStatus,
    pub progress: u8,
}

/// Receives tracker telemetry. Completion logic never depends on it.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _actions: &[Action]) {}

    fn on_update(&self, update: &ActionUpdate);

    fn on_finish(&self, _failed: bool) {}
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_update(&self, _update: &ActionUpdate) {}
}

/// Renders one terminal bar per action.
pub struct ProgressBars {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
}

impl ProgressBars {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            bars: Mutex::new(Vec::new()),
        }
    }

    /// Bars on an interactive terminal, nothing otherwise.
    pub fn for_stdout() -> Box<dyn ProgressObserver> {
        if std::io::stdout().is_terminal() {
            Box::new(Self::new())
        } else {
            Box::new(NoProgress)
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("[{bar:40}] {percent:>3}% - {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░ ")
    }
}

impl Default for ProgressBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressBars {
    fn on_start(&self, actions: &[Action]) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.clear();
        for (index, action) in actions.iter().enumerate() {
            let bar = self.multi.add(ProgressBar::new(100));
            bar.set_style(Self::style());
            bar.set_message(label(index, &action.command, action.resource_id(), action.status));
            bars.push(bar);
        }
    }

    fn on_update(&self, update: &ActionUpdate) {
        let bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = bars.get(update.index) {
            let position = if update.status.is_terminal() {
                100
            } else {
                u64::from(update.progress.min(100))
            };
            bar.set_position(position);
            bar.set_message(label(
                update.index,
                &update.command,
                update.resource_id,
                update.status,
            ));
        }
    }

    fn on_finish(&self, _failed: bool) {
        let bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for bar in bars.iter() {
            bar.abandon();
        }
    }
}

fn label(index: usize, command: &str, resource_id: Option<u64>, status: ActionStatus) -> String {
    let resource = resource_id.map(|id| id.to_string()).unwrap_or_default();
    format!(
        "#{} {} \"{}\" - {}",
        index + 1,
        command,
        resource,
        status.as_str().to_uppercase()
    )
}

// ABOUTME: Provider action tracking
// ABOUTME: Polls action batches to completion and reports progress to an observer

pub mod progress;
pub mod tracker;

pub use progress::{ActionUpdate, NoProgress, ProgressBars, ProgressObserver};
pub use tracker::ActionTracker;

// ABOUTME: Library root for the cloud hibernate orchestrator
// ABOUTME: Stops servers into snapshots and restores them with fresh DNS records

pub mod actions;
pub mod cloud;
pub mod config;
pub mod dns;
pub mod error;
pub mod lifecycle;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{FailedAction, HibernateError};
pub use lifecycle::{LifecycleState, Orchestrator, ShutdownReport, StartupReport};

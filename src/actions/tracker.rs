// ABOUTME: Polls batches of provider actions until every one reaches a terminal state
// ABOUTME: Reports progress each round and aggregates failed actions into a single error

use anyhow::Result;
use futures::future::join_all;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::progress::{ActionUpdate, ProgressObserver};
use crate::cloud::models::{Action, ActionStatus};
use crate::cloud::CloudProvider;
use crate::config::TrackingSettings;
use crate::error::{FailedAction, HibernateError};

/// Consecutive failed lookups of one action before the batch gives up on it.
pub const MAX_LOOKUP_FAILURES: u32 = 5;

pub struct ActionTracker<'a> {
    provider: &'a dyn CloudProvider,
    settings: TrackingSettings,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ActionTracker<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        settings: TrackingSettings,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            provider,
            settings,
            observer,
        }
    }

    /// Wait until every action is terminal.
    ///
    /// Polling never stops at the first failure: the batch resolves only once all
    /// actions are `success` or `error`, so an `ActionsFailed` error lists every
    /// failed action of the batch. Returns the final state of each action, in input order.
    pub async fn wait_for_all(&self, actions: Vec<Action>) -> Result<Vec<Action>> {
        if actions.is_empty() {
            return Ok(actions);
        }

        self.observer.on_start(&actions);
        let started = Instant::now();
        let mut current = actions;
        let mut lookup_failures = vec![0u32; current.len()];
        let mut round = 0u64;

        loop {
            sleep(self.settings.poll_interval).await;
            round += 1;

            let lookups = join_all(current.iter().map(|a| self.provider.get_action(a.id))).await;

            for (index, lookup) in lookups.into_iter().enumerate() {
                match lookup {
                    Ok(action) => {
                        lookup_failures[index] = 0;
                        current[index] = action;
                    }
                    // A terminal state is final, a later lookup cannot change it.
                    Err(err) if current[index].status.is_terminal() => {
                        debug!(
                            action_id = current[index].id,
                            "Ignoring failed lookup of a finished action: {:#}",
                            err
                        );
                    }
                    Err(err) => {
                        lookup_failures[index] += 1;
                        warn!(
                            action_id = current[index].id,
                            attempt = lookup_failures[index],
                            "Failed to look up action: {:#}",
                            err
                        );
                        if lookup_failures[index] >= MAX_LOOKUP_FAILURES {
                            self.observer.on_finish(true);
                            return Err(HibernateError::Remote(format!(
                                "lost track of action {} after {} failed lookups: {:#}",
                                current[index].id, MAX_LOOKUP_FAILURES, err
                            ))
                            .into());
                        }
                    }
                }

                let action = &current[index];
                self.observer.on_update(&ActionUpdate {
                    index,
                    command: action.command.clone(),
                    resource_id: action.resource_id(),
                    status: action.status,
                    progress: action.progress,
                });
            }

            let running: Vec<u64> = current
                .iter()
                .filter(|a| !a.status.is_terminal())
                .map(|a| a.id)
                .collect();
            debug!(round, running = running.len(), total = current.len(), "Polled actions");

            if running.is_empty() {
                break;
            }

            if let Some(timeout) = self.settings.timeout {
                if started.elapsed() >= timeout {
                    self.observer.on_finish(true);
                    return Err(HibernateError::ActionsTimedOut(running).into());
                }
            }
        }

        let failed: Vec<FailedAction> = current
            .iter()
            .filter(|a| a.status == ActionStatus::Error)
            .map(|a| FailedAction {
                action_id: a.id,
                command: a.command.clone(),
                resource_id: a.resource_id(),
                message: a.error.as_ref().map(|e| e.message.clone()),
            })
            .collect();

        self.observer.on_finish(!failed.is_empty());

        if !failed.is_empty() {
            return Err(HibernateError::ActionsFailed(failed).into());
        }

        info!(count = current.len(), rounds = round, "All actions completed");
        Ok(current)
    }
}

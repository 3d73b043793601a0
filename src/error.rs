// ABOUTME: Custom error types for the hibernate orchestrator
// ABOUTME: Distinguishes precondition, action, timeout and remote call failures

use std::fmt;

/// One provider action that ended in the `error` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    pub action_id: u64,
    pub command: String,
    pub resource_id: Option<u64>,
    pub message: Option<String>,
}

impl fmt::Display for FailedAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.action_id, self.command)?;
        if let Some(resource_id) = self.resource_id {
            write!(f, " on resource {}", resource_id)?;
        }
        if let Some(message) = &self.message {
            write!(f, " ({})", message)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum HibernateError {
    Config(String),
    Precondition(String),
    ActionsFailed(Vec<FailedAction>),
    ActionsTimedOut(Vec<u64>),
    Remote(String),
}

impl fmt::Display for HibernateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HibernateError::Config(msg) => write!(f, "Configuration error: {}", msg),
            HibernateError::Precondition(msg) => write!(f, "Precondition violated: {}", msg),
            HibernateError::ActionsFailed(failed) => {
                let list: Vec<String> = failed.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Action execution failed for {} action(s): {}",
                    failed.len(),
                    list.join(", ")
                )
            }
            HibernateError::ActionsTimedOut(ids) => {
                write!(f, "Timed out waiting for actions {:?}", ids)
            }
            HibernateError::Remote(msg) => write!(f, "Remote call failed: {}", msg),
        }
    }
}

impl std::error::Error for HibernateError {}

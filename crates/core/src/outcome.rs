//! Settled task outcomes.

use crate::error::TaskError;
use crate::query::ResolvedQuery;
use std::time::Duration;

/// Terminal state of one worker task.
///
/// `Success(None)` means the worker exited cleanly without ever emitting a
/// result line. Renderers show it as "no data".
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Option<serde_json::Value>),
    Failure(TaskError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The decoded payload, if the task succeeded with data.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Outcome::Success(payload) => payload.as_ref(),
            Outcome::Failure(_) => None,
        }
    }
}

/// A settled outcome joined with the query that produced it.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub query: ResolvedQuery,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn resource_kind(&self) -> &str {
        &self.query.resource_kind
    }
}

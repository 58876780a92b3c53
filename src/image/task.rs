//! Asynchronous generation tasks and the polling loop.

use crate::error::{FailureKind, Result, SheetVizError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Vendor-side task state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not started.
    Pending,
    /// Generating.
    Running,
    /// Finished; the result can be extracted.
    Succeeded,
    /// Finished without a result.
    Failed,
    /// A status string this crate does not know. Treated as still in progress.
    Unknown(String),
}

impl TaskStatus {
    /// Parses a vendor status string (case-insensitive).
    pub fn parse(status: &str) -> Self {
        match status.trim().to_uppercase().as_str() {
            "PENDING" | "QUEUED" | "SUBMITTED" => Self::Pending,
            "RUNNING" | "PROCESSING" => Self::Running,
            "SUCCEEDED" | "SUCCESS" => Self::Succeeded,
            "FAILED" | "CANCELED" | "CANCELLED" => Self::Failed,
            _ => Self::Unknown(status.to_string()),
        }
    }

    /// Returns true once no further polling can change the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// One status query's answer.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    /// Reported status.
    pub status: TaskStatus,
    /// Vendor message, usually the failure reason.
    pub message: Option<String>,
    /// Raw response body.
    pub body: Value,
}

/// A submitted task, updated only from poll responses.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    /// Opaque vendor task id.
    pub task_id: String,
    /// Last reported status.
    pub status: TaskStatus,
    /// Number of status queries issued so far.
    pub polls: u32,
}

impl GenerationTask {
    /// A freshly submitted task.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            polls: 0,
        }
    }
}

/// Poll interval and attempt bound.
///
/// The defaults (30s, 30 polls) are conservative starting points, not
/// vendor guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between status queries.
    pub interval: Duration,
    /// Maximum number of status queries before giving up.
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_polls: 30,
        }
    }
}

impl PollPolicy {
    /// Total time the loop may spend sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_polls
    }
}

/// Something that can report the status of a task.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    /// Issues one status query. `poll` counts from 1.
    async fn query(&self, task_id: &str, poll: u32) -> Result<TaskSnapshot>;
}

/// Polls `task` until it succeeds, fails, or the poll budget runs out.
///
/// Returns the body of the SUCCEEDED response. Query errors other than
/// credential rejection are logged and polling continues.
pub async fn poll_until_terminal<S>(
    source: &S,
    task: &mut GenerationTask,
    policy: &PollPolicy,
) -> Result<Value>
where
    S: TaskStatusSource + ?Sized,
{
    while task.polls < policy.max_polls {
        task.polls += 1;
        let poll = task.polls;

        match source.query(&task.task_id, poll).await {
            Ok(snapshot) => {
                task.status = snapshot.status.clone();
                match snapshot.status {
                    TaskStatus::Succeeded => {
                        tracing::debug!(task_id = %task.task_id, poll, "task succeeded");
                        return Ok(snapshot.body);
                    }
                    TaskStatus::Failed => {
                        return Err(SheetVizError::TaskFailed {
                            task_id: task.task_id.clone(),
                            reason: snapshot
                                .message
                                .unwrap_or_else(|| "no reason given".into()),
                        });
                    }
                    status => {
                        tracing::debug!(
                            task_id = %task.task_id,
                            poll,
                            max_polls = policy.max_polls,
                            status = %status,
                            "task not finished"
                        );
                    }
                }
            }
            Err(e) if e.failure_kind() == FailureKind::Unauthorized => return Err(e),
            Err(e) => {
                tracing::warn!(
                    task_id = %task.task_id,
                    poll,
                    max_polls = policy.max_polls,
                    "status query failed: {e}"
                );
            }
        }

        if task.polls < policy.max_polls {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(SheetVizError::Timeout(policy.budget()))
}

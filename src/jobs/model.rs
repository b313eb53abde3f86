//! Job domain types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// == Job Status ==
/// Lifecycle state of a job. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Allowed moves: Queued→Processing, Processing→Completed, and any
    /// non-terminal state→Failed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("job cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

// == Job ==
/// Tracked unit of asynchronous pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub dataset_ref: String,
    pub status: JobStatus,
    /// Percentage of phases completed, 0–100
    pub progress: u8,
    /// Phase currently running, or the phase that failed
    pub current_phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Job {
    /// A freshly queued job with a new random id.
    pub fn new(dataset_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            dataset_ref: dataset_ref.into(),
            status: JobStatus::Queued,
            progress: 0,
            current_phase: None,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Queued → Processing, positioned on the first phase.
    pub fn start(&mut self, first_phase: Option<&str>) -> Result<(), TransitionError> {
        if self.status != JobStatus::Queued {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.transition(JobStatus::Processing)?;
        self.current_phase = first_phase.map(str::to_string);
        Ok(())
    }

    /// Moves to `phase` with `progress`. Progress never goes down.
    pub fn advance(&mut self, phase: &str, progress: u8) -> Result<(), TransitionError> {
        if self.status != JobStatus::Processing {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.transition(JobStatus::Processing)?;
        self.current_phase = Some(phase.to_string());
        self.progress = self.progress.max(progress.min(100));
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.current_phase = None;
        Ok(())
    }

    /// Marks the job failed. `current_phase` is left on the phase that failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

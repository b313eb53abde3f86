//! Phase Pipeline Module
//!
//! An ordered list of named phases run strictly one after another. Each
//! successful result is handed to a [`PhaseSink`] before the next phase
//! starts, so a failure later on leaves earlier results in place.

mod builtin;
mod phase;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dataset::Table;
use crate::error::{PhaseError, PipelineError};

pub use builtin::default_pipeline;
pub use phase::{FnPhase, Phase, PhaseResult, PriorResults};

// == Progress ==
/// `round(100 * completed / total)`, halves rounding up. An empty pipeline is
/// complete.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}

// == Phase Sink ==
/// Receives pipeline progress as it happens.
#[async_trait]
pub trait PhaseSink: Send {
    /// Called before `phase` runs, with the progress reached so far.
    async fn phase_started(&mut self, phase: &str, progress: u8);

    /// Called once `result` is available, before the next phase starts.
    async fn phase_completed(&mut self, result: &PhaseResult);
}

// == Pipeline Failure ==
/// The phase that stopped the pipeline and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub phase: String,
    pub error: PhaseError,
}

// == Pipeline ==
/// Validated, ordered set of phases.
#[derive(Clone)]
pub struct Pipeline {
    phases: Vec<Arc<dyn Phase>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Declared phase names, in execution order.
    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    // == Run ==
    /// Runs every phase in order over `table`.
    ///
    /// Stops at the first failing phase. Each phase gets at most
    /// `phase_timeout`; overrunning it fails the phase with
    /// [`PhaseError::TimedOut`].
    pub async fn run(
        &self,
        dataset_ref: &str,
        table: Arc<Table>,
        phase_timeout: Duration,
        sink: &mut dyn PhaseSink,
    ) -> Result<PriorResults, PipelineFailure> {
        let total = self.phases.len();
        let mut prior = PriorResults::new();

        for (completed, phase) in self.phases.iter().enumerate() {
            let name = phase.name();
            sink.phase_started(name, progress_percent(completed, total))
                .await;
            debug!(dataset_ref, phase = name, "Phase started");

            let outcome =
                match tokio::time::timeout(phase_timeout, phase.run(Arc::clone(&table), &prior))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(PhaseError::TimedOut),
                };

            let payload = match outcome {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(dataset_ref, phase = name, error = %error, "Phase failed");
                    return Err(PipelineFailure {
                        phase: name.to_string(),
                        error,
                    });
                }
            };

            let result = PhaseResult {
                phase_name: name.to_string(),
                dataset_ref: dataset_ref.to_string(),
                payload,
            };
            sink.phase_completed(&result).await;
            prior.push(result);
        }

        Ok(prior)
    }
}

// == Pipeline Builder ==
#[derive(Default)]
pub struct PipelineBuilder {
    phases: Vec<Arc<dyn Phase>>,
}

impl PipelineBuilder {
    /// Appends a phase.
    pub fn phase(mut self, phase: impl Phase + 'static) -> Self {
        self.phases.push(Arc::new(phase));
        self
    }

    /// Appends a synchronous function as a phase.
    pub fn phase_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Table, &PriorResults) -> Result<serde_json::Value, PhaseError>
            + Send
            + Sync
            + 'static,
    {
        self.phase(FnPhase::new(name, func))
    }

    /// Validates names: non-empty, no `:`, unique.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let mut seen = HashSet::new();
        for phase in &self.phases {
            let name = phase.name();
            if name.is_empty() || name.contains(':') {
                return Err(PipelineError::InvalidPhaseName(name.to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(PipelineError::DuplicatePhase(name.to_string()));
            }
        }
        Ok(Pipeline {
            phases: self.phases,
        })
    }
}

//! Phase Module
//!
//! A phase is one named analysis step over a dataset.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::Table;
use crate::error::PhaseError;

// == Phase Result ==
/// Output of one completed phase for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub dataset_ref: String,
    pub payload: Value,
}

// == Prior Results ==
/// Results of the phases that already ran in this pipeline, in order.
#[derive(Debug, Clone, Default)]
pub struct PriorResults {
    results: Vec<PhaseResult>,
}

impl PriorResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload produced by the phase named `phase_name`, if it ran.
    pub fn get(&self, phase_name: &str) -> Option<&Value> {
        self.results
            .iter()
            .find(|r| r.phase_name == phase_name)
            .map(|r| &r.payload)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub(crate) fn push(&mut self, result: PhaseResult) {
        self.results.push(result);
    }
}

// == Phase ==
/// One step of the analysis pipeline.
///
/// Implementations that do heavy synchronous work should not block the
/// runtime; wrap them in [`FnPhase`] instead so they run on the blocking pool.
#[async_trait]
pub trait Phase: Send + Sync {
    /// Name of the phase, also the name of the view it produces.
    fn name(&self) -> &str;

    /// Runs the phase over `table` given earlier phases' output.
    async fn run(&self, table: Arc<Table>, prior: &PriorResults) -> Result<Value, PhaseError>;
}

// == Fn Phase ==
/// Adapts a synchronous function into a [`Phase`] run on the blocking pool.
pub struct FnPhase<F> {
    name: String,
    func: Arc<F>,
}

impl<F> FnPhase<F>
where
    F: Fn(&Table, &PriorResults) -> Result<Value, PhaseError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> Phase for FnPhase<F>
where
    F: Fn(&Table, &PriorResults) -> Result<Value, PhaseError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, table: Arc<Table>, prior: &PriorResults) -> Result<Value, PhaseError> {
        let func = Arc::clone(&self.func);
        let prior = prior.clone();

        // If the caller's timeout fires first the blocking task keeps running
        // to completion and its result is discarded.
        tokio::task::spawn_blocking(move || func(&table, &prior))
            .await
            .map_err(|err| PhaseError::Panicked(err.to_string()))?
    }
}

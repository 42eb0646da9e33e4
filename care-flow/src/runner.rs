//! `PipelineRunner` wraps the common load → execute one step → save cycle.
//!
//! Interactive services usually want exactly one step per request: run the
//! current stage, reply to the client, and persist the session for the next
//! roundtrip. The runner makes that a one-liner. Construct it once per
//! process when every request uses the same pipeline, or per request when the
//! pipeline carries request-scoped resources (the construction cost is two
//! `Arc` clones).

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    pipeline::{Pipeline, StepResult},
    session::SessionStorage,
};

#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { pipeline, storage }
    }

    /// Execute one step for `session_id` and persist the updated session.
    ///
    /// A step ends when a stage yields control (`Next`, `WaitForInput`,
    /// `End`); stages chained with `NextAndRun` all run within the same step.
    pub async fn run(&self, session_id: &str) -> Result<StepResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.pipeline.run_step(&mut session).await;

        // Persist even on stage failure so progress notes and partial context
        // survive for inspection; the error still propagates to the caller.
        self.storage.save(session).await?;

        result
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    error::{FlowError, Result},
    session::Session,
    stage::{Advance, Stage, StageOutcome},
};

/// An ordered sequence of stages executed one session step at a time.
///
/// Unlike a general task graph there is no branching: each stage has at most
/// one successor, determined by insertion order. A stage decides at runtime
/// whether the session advances, waits for input, or ends (see [`Advance`]).
pub struct Pipeline {
    id: String,
    stages: Vec<Arc<dyn Stage>>,
    index: HashMap<String, usize>,
}

impl Pipeline {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn first_stage_id(&self) -> Option<&str> {
        self.stages.first().map(|s| s.id())
    }

    fn stage(&self, id: &str) -> Result<&Arc<dyn Stage>> {
        self.index
            .get(id)
            .map(|&i| &self.stages[i])
            .ok_or_else(|| FlowError::StageNotFound(id.to_string()))
    }

    fn next_stage_id(&self, id: &str) -> Option<&str> {
        let i = *self.index.get(id)?;
        self.stages.get(i + 1).map(|s| s.id())
    }

    /// Execute the session's current stage and apply its [`Advance`] decision.
    ///
    /// `Advance::NextAndRun` chains into the following stage within the same
    /// call; every other decision returns control to the caller. The session
    /// is updated in place but not persisted here — that is the runner's job.
    pub async fn run_step(&self, session: &mut Session) -> Result<StepResult> {
        let stage = self.stage(&session.current_stage)?;
        debug!(pipeline = %self.id, stage = %stage.id(), session = %session.id, "running stage");

        let outcome: StageOutcome = stage.run(session.context.clone()).await?;
        session.status_message = outcome.status.clone();

        match outcome.advance {
            Advance::Next => {
                if let Some(next) = self.next_stage_id(&session.current_stage) {
                    session.current_stage = next.to_string();
                }
                Ok(StepResult {
                    reply: outcome.reply,
                    status: RunStatus::WaitingForInput,
                })
            }
            Advance::NextAndRun => match self.next_stage_id(&session.current_stage) {
                Some(next) => {
                    session.current_stage = next.to_string();
                    Box::pin(self.run_step(session)).await
                }
                None => Ok(StepResult {
                    reply: outcome.reply,
                    status: RunStatus::Completed,
                }),
            },
            Advance::WaitForInput => Ok(StepResult {
                reply: outcome.reply,
                status: RunStatus::WaitingForInput,
            }),
            Advance::End => Ok(StepResult {
                reply: outcome.reply,
                status: RunStatus::Completed,
            }),
        }
    }
}

/// Builder for assembling a [`Pipeline`] in execution order.
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline {
                id: id.into(),
                stages: Vec::new(),
                index: HashMap::new(),
            },
        }
    }

    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        let id = stage.id().to_string();
        self.pipeline.index.insert(id, self.pipeline.stages.len());
        self.pipeline.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Result of a single session step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub reply: Option<String>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The session stopped and waits for the caller to drive the next step.
    WaitingForInput,
    /// The pipeline ran to completion for this session.
    Completed,
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// What the pipeline should do once a stage has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advance {
    /// Move the session to the next stage, but stop this run. The caller
    /// drives the next step (typically on the next request).
    Next,
    /// Move to the next stage and execute it immediately within this run.
    NextAndRun,
    /// Stay on the current stage until external input arrives.
    WaitForInput,
    /// The pipeline is finished.
    End,
}

/// Result of running a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Text to surface to the caller, if any.
    pub reply: Option<String>,
    pub advance: Advance,
    /// Short human-readable progress note, kept on the session.
    pub status: Option<String>,
}

impl StageOutcome {
    pub fn new(reply: Option<String>, advance: Advance) -> Self {
        Self {
            reply,
            advance,
            status: None,
        }
    }

    pub fn with_status(
        reply: Option<String>,
        advance: Advance,
        status: impl Into<String>,
    ) -> Self {
        Self {
            reply,
            advance,
            status: Some(status.into()),
        }
    }
}

/// A single unit of work in a pipeline.
///
/// Stages communicate exclusively through the shared [`Context`]; a stage
/// instance may be shared between sessions or constructed per request when it
/// carries request-scoped resources (event channels, model handles).
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier of this stage within its pipeline.
    fn id(&self) -> &str;

    async fn run(&self, ctx: Context) -> Result<StageOutcome>;
}

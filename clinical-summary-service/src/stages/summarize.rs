use async_trait::async_trait;
use care_flow::{Advance, Context, FlowError, Stage, StageOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::{
    config::ModelConfig,
    generation::{GenerationEvent, GenerationState, stream_summary},
    ollama::OllamaClient,
    parse::ParsedResponse,
};

/// Runs the summarizer model over the source content, streaming parsed
/// snapshots to the caller, and freezes the final summary in the context.
pub struct SummarizeStage {
    client: Arc<OllamaClient>,
    models: ModelConfig,
    events: mpsc::Sender<GenerationEvent>,
}

impl SummarizeStage {
    pub fn new(
        client: Arc<OllamaClient>,
        models: ModelConfig,
        events: mpsc::Sender<GenerationEvent>,
    ) -> Self {
        Self {
            client,
            models,
            events,
        }
    }
}

#[async_trait]
impl Stage for SummarizeStage {
    fn id(&self) -> &str {
        "summarize"
    }

    async fn run(&self, ctx: Context) -> care_flow::Result<StageOutcome> {
        let content: String = ctx.get_required("source_content").await?;
        info!(model = %self.models.summary_model, "generating consultation summary");

        let outcome = match stream_summary(
            &self.client,
            &self.models.summary_model,
            &content,
            &self.events,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%err, "summary generation failed");
                let _ = self
                    .events
                    .send(GenerationEvent::Error {
                        state: GenerationState::StreamingSummary,
                        message: err.to_string(),
                    })
                    .await;
                return Err(FlowError::StageFailed(err.to_string()));
            }
        };

        if let ParsedResponse::Structured { thinking, .. } = &outcome.parsed {
            ctx.set("thinking", thinking).await;
        }
        ctx.set("raw_response", &outcome.raw).await;
        ctx.set("summary", &outcome.summary).await;

        Ok(StageOutcome::with_status(
            None,
            Advance::NextAndRun,
            "summary generated, validating against source",
        ))
    }
}

use async_trait::async_trait;
use care_flow::{Advance, Context, Stage, StageOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    config::ModelConfig,
    generation::{GenerationEvent, GenerationState, highlight_source, validate_summary},
    ollama::OllamaClient,
};

/// Asks the validator model which source phrases justify the frozen
/// summary and stores the highlight mapping. Validator failures degrade to
/// an empty highlight set — the generated summary is never discarded here.
pub struct ValidateStage {
    client: Arc<OllamaClient>,
    models: ModelConfig,
    events: mpsc::Sender<GenerationEvent>,
}

impl ValidateStage {
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
impl Stage for ValidateStage {
    fn id(&self) -> &str {
        "validate"
    }

    async fn run(&self, ctx: Context) -> care_flow::Result<StageOutcome> {
        let original: String = ctx.get_required("source_content").await?;
        let summary: String = ctx.get_required("summary").await?;

        let _ = self
            .events
            .send(GenerationEvent::State {
                state: GenerationState::Validating,
            })
            .await;

        info!(model = %self.models.validation_model, "validating summary against source");
        let (highlights, warning) = validate_summary(
            &self.client,
            &self.models.validation_model,
            &original,
            &summary,
        )
        .await;

        if let Some(message) = warning {
            let _ = self
                .events
                .send(GenerationEvent::ValidationWarning { message })
                .await;
        }

        let highlighted_source = highlight_source(&original, &highlights);
        ctx.set("highlights", highlights.terms()).await;
        ctx.set("highlighted_source", &highlighted_source).await;
        ctx.set("awaiting_confirmation", true).await;

        // The caller may already be gone; the session keeps the results
        // either way.
        let _ = self
            .events
            .send(GenerationEvent::Done {
                summary: summary.clone(),
                highlights: highlights.into_terms(),
                highlighted_source,
            })
            .await;

        Ok(StageOutcome::with_status(
            Some(summary),
            Advance::Next,
            "summary ready, waiting for nurse confirmation",
        ))
    }
}

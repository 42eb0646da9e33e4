use care_flow::{Pipeline, PipelineBuilder, Session};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::ModelConfig,
    generation::GenerationEvent,
    ollama::OllamaClient,
    records::RecordStore,
    stages::{ConfirmStage, NurseReviewStage, SummarizeStage, ValidateStage},
};

pub const PIPELINE_ID: &str = "consultation_summary";

/// Assemble the generation pipeline for one request:
/// summarize → validate → nurse review → confirm.
///
/// The pipeline is built per request because the first two stages carry the
/// request's event channel and model snapshot; construction is a handful of
/// `Arc` clones.
pub fn build_generation_pipeline(
    client: Arc<OllamaClient>,
    models: ModelConfig,
    records: Arc<RecordStore>,
    events: mpsc::Sender<GenerationEvent>,
) -> Pipeline {
    PipelineBuilder::new(PIPELINE_ID)
        .stage(Arc::new(SummarizeStage::new(
            client.clone(),
            models.clone(),
            events.clone(),
        )))
        .stage(Arc::new(ValidateStage::new(client, models.clone(), events)))
        .stage(Arc::new(NurseReviewStage))
        .stage(Arc::new(ConfirmStage::new(records, models)))
        .build()
}

/// Create a session positioned at the summarize stage, seeded with the
/// source content.
pub async fn new_generation_session(
    content: String,
    patient_id: Option<i64>,
    inference_type: Option<String>,
) -> Session {
    let session = Session::new(Uuid::new_v4().to_string(), PIPELINE_ID, "summarize");
    session.context.set("source_content", content).await;
    if let Some(patient_id) = patient_id {
        session.context.set("patient_id", patient_id).await;
    }
    if let Some(inference_type) = inference_type {
        session.context.set("inference_type", inference_type).await;
    }
    session
}

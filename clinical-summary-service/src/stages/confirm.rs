use async_trait::async_trait;
use care_flow::{Advance, Context, FlowError, Stage, StageOutcome};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::ModelConfig,
    records::{InferenceRecord, RecordStatus, RecordStore},
};

/// Writes the confirmed inference into the record store. An unchanged
/// confirmation is recorded as `confirmed`, an edited one as `completed`.
pub struct ConfirmStage {
    records: Arc<RecordStore>,
    models: ModelConfig,
}

impl ConfirmStage {
    pub fn new(records: Arc<RecordStore>, models: ModelConfig) -> Self {
        Self { records, models }
    }
}

#[async_trait]
impl Stage for ConfirmStage {
    fn id(&self) -> &str {
        "confirm"
    }

    async fn run(&self, ctx: Context) -> care_flow::Result<StageOutcome> {
        let original: String = ctx.get_required("source_content").await?;
        let summary: String = ctx.get_required("summary").await?;
        let confirmation: String = ctx.get_required("nurse_confirmation").await?;

        let patient_id: Option<i64> = ctx.get("patient_id").await;
        let inference_type: String = ctx
            .get("inference_type")
            .await
            .unwrap_or_else(|| "consultation_summary".to_string());
        let highlights: Vec<String> = ctx.get("highlights").await.unwrap_or_default();

        let modified = summary.trim() != confirmation.trim();
        let status = if modified {
            RecordStatus::Completed
        } else {
            RecordStatus::Confirmed
        };

        let record = InferenceRecord {
            id: Uuid::new_v4().to_string(),
            patient_id,
            inference_type,
            original_content: original,
            ai_generated_result: summary,
            nurse_confirmation: confirmation,
            relevant_highlights: highlights,
            model_used: self.models.summary_model.clone(),
            status,
            created_at: Utc::now(),
        };
        let record_id = record.id.clone();

        self.records
            .insert(record)
            .map_err(|err| FlowError::InvalidInput(err.to_string()))?;

        info!(%record_id, ?status, "inference record persisted");
        ctx.set("record_id", &record_id).await;

        Ok(StageOutcome::with_status(
            Some(format!("confirmation recorded as {record_id}")),
            Advance::End,
            "record persisted",
        ))
    }
}

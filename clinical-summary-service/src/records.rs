use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A confirmed AI inference, written only after a nurse has signed off on
/// the generated text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub id: String,
    pub patient_id: Option<i64>,
    pub inference_type: String,
    pub original_content: String,
    pub ai_generated_result: String,
    pub nurse_confirmation: String,
    pub relevant_highlights: Vec<String>,
    pub model_used: String,
    /// `confirmed` when the nurse accepted the AI text unchanged,
    /// `completed` when it was edited before confirmation.
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Confirmed,
    Completed,
}

#[derive(Debug, Error)]
#[error("an identical consultation record already exists")]
pub struct DuplicateRecord;

/// In-memory record store keyed by record id.
#[derive(Default)]
pub struct RecordStore {
    records: DashMap<String, InferenceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, rejecting an exact duplicate of an existing one
    /// (same patient and same content fields).
    pub fn insert(&self, record: InferenceRecord) -> Result<(), DuplicateRecord> {
        let duplicate = self.records.iter().any(|existing| {
            existing.patient_id == record.patient_id
                && existing.original_content == record.original_content
                && existing.ai_generated_result == record.ai_generated_result
                && existing.nurse_confirmation == record.nurse_confirmation
        });
        if duplicate {
            return Err(DuplicateRecord);
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<InferenceRecord> {
        self.records.get(id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

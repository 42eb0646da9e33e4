use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub content: String,
    pub patient_id: Option<i64>,
    pub inference_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub original: String,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub relevant_text: Vec<String>,
    pub highlighted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub nurse_confirmation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub status: String,
    pub current_stage: String,
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub waiting_for_confirmation: bool,
}

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;

/// Thin client for an Ollama-compatible model runner.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// Start a streaming generation and return the raw byte stream of
    /// newline-delimited JSON chunks.
    pub async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, ServiceError> {
        debug!(model, prompt_len = prompt.len(), "starting streaming generation");
        let response = self
            .http
            .post(self.generate_url())
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Endpoint {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.bytes_stream())
    }

    /// Run a non-streaming generation and return the full response text.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, ServiceError> {
        debug!(model, prompt_len = prompt.len(), "starting generation");
        let response = self
            .http
            .post(self.generate_url())
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Endpoint {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }

    /// List the models the runner has available (`/api/tags` passthrough).
    pub async fn list_models(&self) -> Result<Value, ServiceError> {
        let response = self.http.get(self.tags_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Endpoint {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

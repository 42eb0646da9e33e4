use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub port: u16,
    pub models: ModelConfig,
}

impl AppConfig {
    /// Read configuration from the environment. `OLLAMA_BASE_URL` is
    /// required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let ollama_base_url = std::env::var("OLLAMA_BASE_URL")
            .map_err(|_| anyhow::anyhow!("OLLAMA_BASE_URL environment variable is required"))?;

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .unwrap_or(3000);

        Ok(Self {
            ollama_base_url,
            port,
            models: ModelConfig {
                summary_model: env_or("SUMMARY_MODEL", "consult-summary"),
                validation_model: env_or("VALIDATION_MODEL", "consult-validation"),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The pair of models one generation request runs against.
///
/// Handlers take a snapshot of the active configuration when a request
/// arrives and hand it to the pipeline, so an admin switching models mid-
/// stream never affects an in-flight generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub summary_model: String,
    pub validation_model: String,
}

/// Update payload for the active model configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelConfigUpdate {
    pub summary_model: Option<String>,
    pub validation_model: Option<String>,
}

/// The mutable active-model selection, shared across requests.
pub struct ActiveModels {
    inner: RwLock<ModelConfig>,
}

impl ActiveModels {
    pub fn new(initial: ModelConfig) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub async fn snapshot(&self) -> ModelConfig {
        self.inner.read().await.clone()
    }

    pub async fn update(&self, update: ModelConfigUpdate) -> ModelConfig {
        let mut current = self.inner.write().await;
        if let Some(model) = update.summary_model {
            info!(%model, "switching active summary model");
            current.summary_model = model;
        }
        if let Some(model) = update.validation_model {
            info!(%model, "switching active validation model");
            current.validation_model = model;
        }
        current.clone()
    }
}

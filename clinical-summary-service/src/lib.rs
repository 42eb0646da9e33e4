pub mod config;
pub mod decode;
pub mod error;
pub mod generation;
pub mod highlight;
pub mod models;
pub mod ollama;
pub mod parse;
pub mod records;
pub mod service;
pub mod stages;
pub mod workflow;

pub use config::{ActiveModels, AppConfig, ModelConfig};
pub use error::ServiceError;
pub use service::{AppState, create_app};

use thiserror::Error;

/// Failures raised while talking to the model endpoints or running the
/// generation pipeline.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("model endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model endpoint returned status {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("client disconnected before generation finished")]
    Aborted,
}

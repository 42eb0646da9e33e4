use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Json, Response},
    routing::{get, post},
};
use care_flow::{InMemorySessionStorage, PipelineRunner, Session, SessionStorage};
use futures::stream;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::{ActiveModels, AppConfig, ModelConfigUpdate},
    generation::{GenerationEvent, highlight_source, validate_summary},
    models::{
        ConfirmRequest, SessionStatusResponse, SummarizeRequest, ValidateRequest, ValidateResponse,
    },
    ollama::OllamaClient,
    records::RecordStore,
    workflow::{build_generation_pipeline, new_generation_session},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OllamaClient>,
    pub sessions: Arc<dyn SessionStorage>,
    pub records: Arc<RecordStore>,
    pub active_models: Arc<ActiveModels>,
}

pub fn create_app(config: &AppConfig) -> Router {
    let state = AppState {
        client: Arc::new(OllamaClient::new(&config.ollama_base_url)),
        sessions: Arc::new(InMemorySessionStorage::new()),
        records: Arc::new(RecordStore::new()),
        active_models: Arc::new(ActiveModels::new(config.models.clone())),
    };
    build_router(state)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/consultations/summarize", post(start_summarize))
        .route("/consultations/validate", post(validate))
        .route("/consultations/{session_id}", get(get_session_status))
        .route("/consultations/{session_id}/confirm", post(confirm))
        .route("/models", get(list_models))
        .route(
            "/models/active",
            get(get_active_models).put(update_active_models),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Clinical Summary Service",
        "version": "0.1.0",
        "description": "Dual-agent consultation summarization with nurse confirmation",
        "endpoints": {
            "POST /consultations/summarize": "Start a streamed summary generation",
            "GET /consultations/{session_id}": "Get session status and results",
            "POST /consultations/{session_id}/confirm": "Submit the nurse confirmation",
            "POST /consultations/validate": "One-shot evidence validation of a summary",
            "GET /models": "List models available on the runner",
            "GET|PUT /models/active": "Read or switch the active models",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Start a generation session and stream its events back as NDJSON.
///
/// The response body carries one JSON event per line: `started` with the
/// session id, then `state`/`summary_delta`/`summary_complete` while the
/// summarizer streams, then `validating` and finally `done` (or `error`).
/// Dropping the response aborts the generation before the validator runs.
async fn start_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Response, ApiError> {
    if request.content.trim().is_empty() {
        return Err(bad_request_error("content is required"));
    }

    let models = state.active_models.snapshot().await;
    let session =
        new_generation_session(request.content, request.patient_id, request.inference_type).await;
    let session_id = session.id.clone();

    save_session(&state, session).await?;
    info!(%session_id, "generation session created");

    let (events_tx, mut events_rx) = mpsc::channel::<GenerationEvent>(16);
    events_tx
        .send(GenerationEvent::Started {
            session_id: session_id.clone(),
        })
        .await
        .map_err(|_| internal_error("event channel closed at startup", ""))?;

    let pipeline = build_generation_pipeline(
        state.client.clone(),
        models,
        state.records.clone(),
        events_tx,
    );
    let runner = PipelineRunner::new(Arc::new(pipeline), state.sessions.clone());

    tokio::spawn(async move {
        if let Err(err) = runner.run(&session_id).await {
            error!(%session_id, %err, "generation pipeline stopped with error");
        }
    });

    let body = Body::from_stream(stream::poll_fn(move |cx| {
        events_rx.poll_recv(cx).map(|event| {
            event.map(|event| {
                let mut line = serde_json::to_string(&event)
                    .unwrap_or_else(|_| r#"{"event":"error","message":"unserializable event"}"#.into());
                line.push('\n');
                Ok::<_, std::convert::Infallible>(line)
            })
        })
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .map_err(|e| internal_error("failed to build streaming response", &e.to_string()))
}

async fn save_session(state: &AppState, session: Session) -> Result<(), ApiError> {
    state.sessions.save(session).await.map_err(|e| {
        error!("failed to save session: {}", e);
        internal_error("failed to create generation session", &e.to_string())
    })
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionStatusResponse> {
    match state.sessions.get(&session_id).await {
        Ok(Some(session)) => {
            let record_id: Option<String> = session.context.get("record_id").await;
            let waiting: bool = session
                .context
                .get("awaiting_confirmation")
                .await
                .unwrap_or(false);

            let status = if record_id.is_some() {
                "completed"
            } else if waiting {
                "waiting_for_confirmation"
            } else {
                "active"
            };

            Ok(Json(SessionStatusResponse {
                session_id: session.id.clone(),
                status: status.to_string(),
                current_stage: session.current_stage.clone(),
                status_message: session.status_message.clone(),
                summary: session.context.get("summary").await,
                thinking: session.context.get("thinking").await,
                highlights: session.context.get("highlights").await,
                highlighted_source: session.context.get("highlighted_source").await,
                record_id,
                waiting_for_confirmation: waiting,
            }))
        }
        Ok(None) => Err(not_found_error("session not found", &session_id)),
        Err(e) => {
            error!("failed to load session {}: {}", session_id, e);
            Err(internal_error("failed to load session", &e.to_string()))
        }
    }
}

async fn confirm(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Value> {
    if request.nurse_confirmation.trim().is_empty() {
        return Err(bad_request_error("nurse_confirmation cannot be empty"));
    }

    let session = match state.sessions.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(not_found_error("session not found", &session_id)),
        Err(e) => return Err(internal_error("failed to load session", &e.to_string())),
    };

    if session.current_stage != "nurse_review" {
        return Err(bad_request_error("session is not waiting for confirmation"));
    }

    session
        .context
        .set("nurse_confirmation", request.nurse_confirmation)
        .await;
    save_session(&state, session).await?;

    // The confirmation stages never emit events; the channel is a stub.
    let (events_tx, _events_rx) = mpsc::channel::<GenerationEvent>(1);
    let models = state.active_models.snapshot().await;
    let pipeline = build_generation_pipeline(
        state.client.clone(),
        models,
        state.records.clone(),
        events_tx,
    );
    let runner = PipelineRunner::new(Arc::new(pipeline), state.sessions.clone());

    match runner.run(&session_id).await {
        Ok(result) => {
            let record_id: Option<String> = match state.sessions.get(&session_id).await {
                Ok(Some(session)) => session.context.get("record_id").await,
                _ => None,
            };
            info!(%session_id, ?record_id, "nurse confirmation processed");
            Ok(Json(json!({
                "session_id": session_id,
                "message": result.reply,
                "record_id": record_id,
            })))
        }
        Err(care_flow::FlowError::InvalidInput(message)) => Err(bad_request_error(&message)),
        Err(e) => {
            error!(%session_id, %e, "confirmation failed");
            Err(internal_error("failed to process confirmation", &e.to_string()))
        }
    }
}

/// One-shot validation of an existing summary against its source, outside
/// any session (used when a nurse re-checks edited text).
async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<ValidateResponse> {
    if request.original.trim().is_empty() || request.summary.trim().is_empty() {
        return Err(bad_request_error("original and summary are required"));
    }

    let models = state.active_models.snapshot().await;
    let (highlights, warning) = validate_summary(
        &state.client,
        &models.validation_model,
        &request.original,
        &request.summary,
    )
    .await;

    let highlighted = highlight_source(&request.original, &highlights);
    Ok(Json(ValidateResponse {
        relevant_text: highlights.into_terms(),
        highlighted,
        warning,
    }))
}

async fn list_models(State(state): State<AppState>) -> ApiResult<Value> {
    state
        .client
        .list_models()
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to list models", &e.to_string()))
}

async fn get_active_models(State(state): State<AppState>) -> ApiResult<Value> {
    let models = state.active_models.snapshot().await;
    Ok(Json(json!({
        "summary_model": models.summary_model,
        "validation_model": models.validation_model,
    })))
}

async fn update_active_models(
    State(state): State<AppState>,
    Json(update): Json<ModelConfigUpdate>,
) -> ApiResult<Value> {
    let models = state.active_models.update(update).await;
    Ok(Json(json!({
        "message": "active models updated",
        "summary_model": models.summary_model,
        "validation_model": models.validation_model,
    })))
}

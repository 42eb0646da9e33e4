use axum::{
    Json, Router,
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clinical_summary_service::{AppConfig, ModelConfig, create_app};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const SOURCE: &str = "Consult for hyperglycemia control post fracture surgery";

/// Minimal stand-in for the model runner: the summary model streams a
/// scripted four-chunk response whose tags straddle chunk boundaries, the
/// validation model answers with evidence JSON, and anything else misbehaves
/// on purpose.
async fn mock_generate(Json(request): Json<Value>) -> Response {
    let model = request["model"].as_str().unwrap_or_default();
    let streaming = request["stream"].as_bool().unwrap_or(false);

    if streaming {
        if model == "missing-summary" {
            return (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded").into_response();
        }
        let script = [
            json!({"model": model, "created_at": "t", "response": "<thinking>", "done": false}),
            json!({"model": model, "created_at": "t", "response": "endocrine focus", "done": false}),
            json!({"model": model, "created_at": "t", "response": "</thinking><answer>Hyperglycemia", "done": false}),
            json!({"model": model, "created_at": "t", "response": " management needed</answer>", "done": true}),
        ];
        let body = script.iter().map(|c| format!("{c}\n")).collect::<String>();
        return Response::builder()
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(Body::from(body))
            .unwrap();
    }

    let payload = match model {
        "consult-validation" => {
            json!({"response": r#"{"relevant_text": ["hyperglycemia", "fracture surgery"]}"#})
        }
        _ => json!({"response": "this is not the JSON you are looking for"}),
    };
    Json(payload).into_response()
}

async fn mock_tags() -> Json<Value> {
    Json(json!({"models": [{"name": "consult-summary"}, {"name": "consult-validation"}]}))
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_service(validation_model: &str) -> String {
    let mock = Router::new()
        .route("/api/generate", post(mock_generate))
        .route("/api/tags", get(mock_tags));
    let mock_addr = spawn(mock).await;

    let config = AppConfig {
        ollama_base_url: format!("http://{mock_addr}"),
        port: 0,
        models: ModelConfig {
            summary_model: "consult-summary".to_string(),
            validation_model: validation_model.to_string(),
        },
    };
    let addr = spawn(create_app(&config)).await;
    format!("http://{addr}")
}

async fn stream_events(base: &str, content: &str) -> Vec<Value> {
    let response = reqwest::Client::new()
        .post(format!("{base}/consultations/summarize"))
        .json(&json!({"content": content}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    body.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn find<'a>(events: &'a [Value], kind: &str) -> Option<&'a Value> {
    events.iter().find(|e| e["event"] == kind)
}

#[tokio::test]
async fn streamed_generation_parses_and_highlights() {
    let base = spawn_service("consult-validation").await;
    let events = stream_events(&base, SOURCE).await;

    let started = find(&events, "started").expect("started event");
    assert!(started["session_id"].as_str().is_some());

    // A mid-stream snapshot must show the completed thinking segment while
    // the answer is still open.
    assert!(events.iter().any(|e| {
        e["event"] == "summary_delta"
            && e["parsed"]["thinking"] == "endocrine focus"
            && e["parsed"]["answer_partial"] == true
    }));

    let complete = find(&events, "summary_complete").expect("summary_complete event");
    assert_eq!(complete["summary"], "Hyperglycemia management needed");

    let done = find(&events, "done").expect("done event");
    assert_eq!(done["summary"], "Hyperglycemia management needed");
    assert_eq!(
        done["highlights"],
        json!(["hyperglycemia", "fracture surgery"])
    );
    assert_eq!(
        done["highlighted_source"],
        "Consult for <mark>hyperglycemia</mark> control post <mark>fracture surgery</mark>"
    );
}

#[tokio::test]
async fn confirmation_persists_a_record_once() {
    let base = spawn_service("consult-validation").await;
    let client = reqwest::Client::new();

    let events = stream_events(&base, SOURCE).await;
    let session_id = find(&events, "started").unwrap()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let status: Value = client
        .get(format!("{base}/consultations/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "waiting_for_confirmation");
    assert_eq!(status["summary"], "Hyperglycemia management needed");
    assert_eq!(status["thinking"], "endocrine focus");

    // Confirm with the AI text unchanged.
    let confirm: Value = client
        .post(format!("{base}/consultations/{session_id}/confirm"))
        .json(&json!({"nurse_confirmation": "Hyperglycemia management needed"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(confirm["record_id"].as_str().is_some());

    let status: Value = client
        .get(format!("{base}/consultations/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "completed");

    // The session is no longer waiting, so a second confirmation is refused.
    let again = client
        .post(format!("{base}/consultations/{session_id}/confirm"))
        .json(&json!({"nurse_confirmation": "Hyperglycemia management needed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 400);

    // An identical generation confirmed identically is a duplicate record.
    let events = stream_events(&base, SOURCE).await;
    let second_session = find(&events, "started").unwrap()["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    let duplicate = client
        .post(format!("{base}/consultations/{second_session}/confirm"))
        .json(&json!({"nurse_confirmation": "Hyperglycemia management needed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 400);
}

#[tokio::test]
async fn broken_validator_degrades_to_empty_highlights() {
    let base = spawn_service("broken-validation").await;
    let events = stream_events(&base, SOURCE).await;

    assert!(find(&events, "validation_warning").is_some());

    let done = find(&events, "done").expect("done event");
    assert_eq!(done["summary"], "Hyperglycemia management needed");
    assert_eq!(done["highlights"], json!([]));
    // With no highlight terms the source comes back untouched.
    assert_eq!(done["highlighted_source"], SOURCE);
}

#[tokio::test]
async fn summarizer_transport_failure_surfaces_an_error_event() {
    let base = spawn_service("consult-validation").await;
    let client = reqwest::Client::new();

    // Point the active summary model at one the runner cannot serve.
    let updated = client
        .put(format!("{base}/models/active"))
        .json(&json!({"summary_model": "missing-summary"}))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);

    let events = stream_events(&base, SOURCE).await;
    let error = find(&events, "error").expect("error event");
    assert_eq!(error["state"], "streaming_summary");
    assert!(find(&events, "done").is_none());

    // One-shot validation still works independently of the failed stream.
    let validated: Value = client
        .post(format!("{base}/consultations/validate"))
        .json(&json!({"original": SOURCE, "summary": "Hyperglycemia management needed"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(validated["relevant_text"], json!(["hyperglycemia", "fracture surgery"]));
}

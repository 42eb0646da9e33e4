use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    decode::StreamDecoder,
    error::ServiceError,
    highlight::{HighlightSet, apply_highlights},
    ollama::OllamaClient,
    parse::{ParsedResponse, answer_or_whole, parse_response},
};

/// Phases of one generation request, in order. `Error` is terminal and
/// reachable from any phase after `Idle`; everything already streamed stays
/// visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Idle,
    StreamingSummary,
    SummaryComplete,
    Validating,
    Done,
    Error,
}

/// Events emitted to the caller over the lifetime of one generation
/// request, serialized as one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// First line of every generation stream.
    Started { session_id: String },
    State { state: GenerationState },
    /// Parsed snapshot of the accumulated summary after a decoded chunk.
    SummaryDelta { parsed: ParsedResponse },
    SummaryComplete { summary: String },
    /// The validator degraded to an empty highlight set; generation still
    /// succeeds.
    ValidationWarning { message: String },
    Done {
        summary: String,
        highlights: Vec<String>,
        highlighted_source: String,
    },
    Error {
        state: GenerationState,
        message: String,
    },
}

/// Everything the summary phase produces once its stream has completed.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    /// Full accumulated response text, tags included.
    pub raw: String,
    pub parsed: ParsedResponse,
    /// The frozen summary: the answer segment, or the whole response when
    /// the output carried no tags.
    pub summary: String,
}

/// Stream the summarizer model over `content`, re-emitting a parsed
/// `thinking`/`answer` snapshot after every decoded chunk.
///
/// A failed event send means the caller dropped the stream; the generation
/// stops there and the validator is never invoked.
pub async fn stream_summary(
    client: &OllamaClient,
    model: &str,
    content: &str,
    events: &mpsc::Sender<GenerationEvent>,
) -> Result<SummaryOutcome, ServiceError> {
    send(events, GenerationEvent::State {
        state: GenerationState::StreamingSummary,
    })
    .await?;

    let mut stream = Box::pin(client.stream_generate(model, content).await?);
    let mut decoder = StreamDecoder::new();
    let mut running = String::new();

    while let Some(item) = stream.next().await {
        let bytes = item?;
        for chunk in decoder.push(&bytes) {
            running.push_str(&chunk.response);
            send(events, GenerationEvent::SummaryDelta {
                parsed: parse_response(&running),
            })
            .await?;
        }
        if decoder.is_done() {
            break;
        }
    }

    for chunk in decoder.finish() {
        running.push_str(&chunk.response);
        send(events, GenerationEvent::SummaryDelta {
            parsed: parse_response(&running),
        })
        .await?;
    }

    let raw = decoder.accumulated().to_string();
    let parsed = parse_response(&raw);
    let summary = parsed.summary_text().to_string();

    info!(chars = raw.len(), "summary stream complete");
    send(events, GenerationEvent::SummaryComplete {
        summary: summary.clone(),
    })
    .await?;

    Ok(SummaryOutcome { raw, parsed, summary })
}

/// Ask the validator model which source phrases justify `summary`.
///
/// Any failure — transport, non-2xx, unusable JSON — degrades to an empty
/// highlight set with a warning instead of failing the generation.
pub async fn validate_summary(
    client: &OllamaClient,
    model: &str,
    original: &str,
    summary: &str,
) -> (HighlightSet, Option<String>) {
    let focus = answer_or_whole(summary);
    let prompt = build_validation_prompt(original, focus);

    let raw = match client.generate(model, &prompt).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(%err, "validator call failed, continuing without highlights");
            return (
                HighlightSet::default(),
                Some(format!("validator call failed: {err}")),
            );
        }
    };

    match HighlightSet::from_validator_payload(&raw) {
        Ok(set) => {
            info!(terms = set.terms().len(), "validator returned highlight terms");
            (set, None)
        }
        Err(err) => {
            warn!(%err, "validator output was not valid JSON, continuing without highlights");
            (
                HighlightSet::default(),
                Some(format!("validator output could not be parsed: {err}")),
            )
        }
    }
}

/// Apply a highlight set to the original source for display.
pub fn highlight_source(original: &str, set: &HighlightSet) -> String {
    apply_highlights(original, set)
}

fn build_validation_prompt(original: &str, summary: &str) -> String {
    format!("#Consultation request:\n{original}\n\n#Nurse confirmation result:\n{summary}")
}

async fn send(
    events: &mpsc::Sender<GenerationEvent>,
    event: GenerationEvent,
) -> Result<(), ServiceError> {
    events.send(event).await.map_err(|_| ServiceError::Aborted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_tagged_lines() {
        let event = GenerationEvent::State {
            state: GenerationState::StreamingSummary,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"state","state":"streaming_summary"}"#
        );

        let event = GenerationEvent::SummaryDelta {
            parsed: parse_response("<thinking>hm"),
        };
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains(r#""event":"summary_delta""#));
        assert!(line.contains(r#""thinking_partial":true"#));
    }

    #[test]
    fn validation_prompt_carries_both_texts() {
        let prompt = build_validation_prompt("original text", "summary text");
        assert!(prompt.contains("original text"));
        assert!(prompt.contains("summary text"));
    }
}

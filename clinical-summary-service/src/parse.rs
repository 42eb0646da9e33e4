use serde::{Deserialize, Serialize};

const THINKING_OPEN: &str = "<thinking>";
const THINKING_CLOSE: &str = "</thinking>";
const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";

/// Structured view of a (possibly still streaming) model response.
///
/// The summary models are prompted to wrap their reasoning in
/// `<thinking>…</thinking>` and the final text in `<answer>…</answer>`.
/// While the stream is in flight a tag may be open but not yet closed; its
/// content is returned anyway, flagged as partial, so the caller can show a
/// live "reasoning…" view. Responses without any tag pass through untouched.
///
/// This is free-text parsing of model output: a response that legitimately
/// contains the literal tag strings will be misread as structure. Only the
/// first occurrence of each tag is considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedResponse {
    Structured {
        thinking: String,
        answer: String,
        thinking_partial: bool,
        answer_partial: bool,
    },
    Plain {
        text: String,
    },
}

impl ParsedResponse {
    /// The text a completed generation freezes as its summary: the answer
    /// segment when the response is structured, the whole text otherwise.
    pub fn summary_text(&self) -> &str {
        match self {
            ParsedResponse::Structured { answer, .. } => answer,
            ParsedResponse::Plain { text } => text,
        }
    }
}

/// Parse the full accumulated response text. Pure and idempotent — the text
/// is re-parsed from scratch on every call because tag boundaries may span
/// stream chunks.
pub fn parse_response(text: &str) -> ParsedResponse {
    if !text.contains(THINKING_OPEN) && !text.contains(ANSWER_OPEN) {
        return ParsedResponse::Plain {
            text: text.to_string(),
        };
    }

    let (thinking, thinking_partial) = extract_segment(text, THINKING_OPEN, THINKING_CLOSE);
    let (answer, answer_partial) = extract_segment(text, ANSWER_OPEN, ANSWER_CLOSE);

    ParsedResponse::Structured {
        thinking,
        answer,
        thinking_partial,
        answer_partial,
    }
}

/// Extract the segment delimited by `open`/`close`. An open tag without its
/// closing counterpart yields everything after the tag, flagged partial.
fn extract_segment(text: &str, open: &str, close: &str) -> (String, bool) {
    let Some(start) = text.find(open) else {
        return (String::new(), false);
    };
    let body = &text[start + open.len()..];
    match body.find(close) {
        Some(end) => (body[..end].trim().to_string(), false),
        None => (body.trim().to_string(), true),
    }
}

/// The text the validator should check: the `<answer>` body when the summary
/// carries a complete answer tag, otherwise the summary unchanged.
pub fn answer_or_whole(summary: &str) -> &str {
    if let Some(start) = summary.find(ANSWER_OPEN) {
        let body = &summary[start + ANSWER_OPEN.len()..];
        if let Some(end) = body.find(ANSWER_CLOSE) {
            return body[..end].trim();
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_thinking_and_answer() {
        let parsed =
            parse_response("<thinking>reasoning here</thinking><answer>final summary</answer>");
        assert_eq!(
            parsed,
            ParsedResponse::Structured {
                thinking: "reasoning here".to_string(),
                answer: "final summary".to_string(),
                thinking_partial: false,
                answer_partial: false,
            }
        );
    }

    #[test]
    fn open_thinking_is_partial() {
        let parsed = parse_response("<thinking>still going");
        assert_eq!(
            parsed,
            ParsedResponse::Structured {
                thinking: "still going".to_string(),
                answer: String::new(),
                thinking_partial: true,
                answer_partial: false,
            }
        );
    }

    #[test]
    fn open_answer_after_complete_thinking() {
        let parsed = parse_response("<thinking>t</thinking><answer>partial ans");
        assert_eq!(
            parsed,
            ParsedResponse::Structured {
                thinking: "t".to_string(),
                answer: "partial ans".to_string(),
                thinking_partial: false,
                answer_partial: true,
            }
        );
    }

    #[test]
    fn untagged_text_passes_through() {
        let parsed = parse_response("Plain unstructured output");
        assert_eq!(
            parsed,
            ParsedResponse::Plain {
                text: "Plain unstructured output".to_string(),
            }
        );
        assert_eq!(parsed.summary_text(), "Plain unstructured output");
    }

    #[test]
    fn only_first_tag_pair_is_considered() {
        let parsed = parse_response("<answer>one</answer><answer>two</answer>");
        assert_eq!(
            parsed,
            ParsedResponse::Structured {
                thinking: String::new(),
                answer: "one".to_string(),
                thinking_partial: false,
                answer_partial: false,
            }
        );
    }

    #[test]
    fn parser_is_idempotent() {
        let text = "<thinking>a</thinking><answer>b";
        assert_eq!(parse_response(text), parse_response(text));
    }

    #[test]
    fn answer_or_whole_extracts_complete_answer() {
        assert_eq!(
            answer_or_whole("<thinking>x</thinking><answer> the answer </answer>"),
            "the answer"
        );
        assert_eq!(answer_or_whole("no tags here"), "no tags here");
        // An unterminated answer tag is left alone.
        assert_eq!(answer_or_whole("<answer>open"), "<answer>open");
    }
}

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// Ordered list of source phrases the validator model flagged as evidence
/// for a generated summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightSet {
    terms: Vec<String>,
}

impl HighlightSet {
    /// Empty terms are discarded — they would match every position.
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms.into_iter().filter(|t| !t.trim().is_empty()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn into_terms(self) -> Vec<String> {
        self.terms
    }

    /// Build a highlight set from the validator model's raw output.
    ///
    /// The expected shape is `{"relevant_text": …}` where the value is
    /// either a flat array of source phrases or an object mapping summary
    /// sentences to arrays of phrases. Only the phrase lists are consumed;
    /// a mapping is flattened in order and duplicates are kept.
    pub fn from_validator_payload(raw: &str) -> Result<Self, serde_json::Error> {
        let value = parse_lenient(raw)?;
        let relevant = value.get("relevant_text").cloned().unwrap_or(Value::Null);
        Ok(Self::flatten(&relevant))
    }

    fn flatten(value: &Value) -> Self {
        let mut terms = Vec::new();
        match value {
            Value::Array(items) => collect_strings(items, &mut terms),
            Value::Object(map) => {
                for entry in map.values() {
                    match entry {
                        Value::Array(items) => collect_strings(items, &mut terms),
                        Value::String(s) => terms.push(s.clone()),
                        _ => {}
                    }
                }
            }
            Value::String(s) => terms.push(s.clone()),
            _ => {}
        }
        Self::new(terms)
    }
}

fn collect_strings(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        if let Value::String(s) = item {
            out.push(s.clone());
        }
    }
}

/// Parse validator output, tolerating the invalid escape sequences the
/// models tend to emit around prescription symbols (`\#`, `\*`, …). The
/// repaired text is only used if the original fails to parse.
fn parse_lenient(raw: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(first) => match serde_json::from_str(&repair_invalid_escapes(raw)) {
            Ok(value) => Ok(value),
            Err(_) => Err(first),
        },
    }
}

fn repair_invalid_escapes(raw: &str) -> String {
    const INVALID: [(&str, &str); 8] = [
        ("\\#", "#"),
        ("\\*", "*"),
        ("\\&", "&"),
        ("\\%", "%"),
        ("\\@", "@"),
        ("\\_", "_"),
        ("\\~", "~"),
        ("\\$", "$"),
    ];
    let mut fixed = raw.to_string();
    for (bad, good) in INVALID {
        if fixed.contains(bad) {
            fixed = fixed.replace(bad, good);
        }
    }
    fixed
}

/// Wrap every evidence match in `text` with highlight markers.
///
/// Matching runs per line (the contiguous text node the renderer works
/// with): a line wholly contained in any term is wrapped as a unit,
/// otherwise each individual match of the term alternation is wrapped.
/// Character content is never dropped or reordered; with no terms the input
/// comes back unchanged.
pub fn apply_highlights(text: &str, set: &HighlightSet) -> String {
    if set.is_empty() {
        return text.to_string();
    }

    let pattern = set
        .terms()
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let matcher = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(err) => {
            warn!(%err, "could not build highlight matcher, leaving text unhighlighted");
            return text.to_string();
        }
    };

    text.split('\n')
        .map(|line| highlight_line(line, set, &matcher))
        .collect::<Vec<_>>()
        .join("\n")
}

fn highlight_line(line: &str, set: &HighlightSet, matcher: &Regex) -> String {
    if line.is_empty() {
        return String::new();
    }

    // Coarse containment first: a term that contains the whole line marks
    // the entire line.
    let line_lower = line.to_lowercase();
    if set
        .terms()
        .iter()
        .any(|term| term.to_lowercase().contains(&line_lower))
    {
        return format!("{MARK_OPEN}{line}{MARK_CLOSE}");
    }

    matcher
        .replace_all(line, |caps: &regex::Captures| {
            format!("{MARK_OPEN}{}{MARK_CLOSE}", &caps[0])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(terms: &[&str]) -> HighlightSet {
        HighlightSet::new(terms.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn wraps_each_matching_substring() {
        let out = apply_highlights(
            "Patient has swelling in left neck",
            &set(&["swelling", "left neck"]),
        );
        assert_eq!(
            out,
            "Patient has <mark>swelling</mark> in <mark>left neck</mark>"
        );
    }

    #[test]
    fn empty_term_list_passes_through_exactly() {
        let text = "Patient has swelling in left neck\n\nSecond paragraph";
        assert_eq!(apply_highlights(text, &HighlightSet::default()), text);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let out = apply_highlights("Hyperglycemia noted", &set(&["hyperglycemia"]));
        assert_eq!(out, "<mark>Hyperglycemia</mark> noted");
    }

    #[test]
    fn term_containing_whole_line_wraps_the_line() {
        // The term is broader than the line, so no in-line match exists; the
        // containment branch still marks the line as evidence.
        let out = apply_highlights(
            "left neck",
            &set(&["swelling in left neck region"]),
        );
        assert_eq!(out, "<mark>left neck</mark>");
    }

    #[test]
    fn newlines_are_preserved() {
        let out = apply_highlights("first fever line\nsecond line", &set(&["fever"]));
        assert_eq!(out, "first <mark>fever</mark> line\nsecond line");
    }

    #[test]
    fn regex_metacharacters_in_terms_are_literal() {
        let out = apply_highlights("dose 2.5 mg (daily)", &set(&["2.5 mg (daily)"]));
        assert_eq!(out, "dose <mark>2.5 mg (daily)</mark>");
    }

    #[test]
    fn flattens_sentence_mapping_in_order() {
        let raw = r#"{"relevant_text": {"sentence one": ["fever", "cough"], "sentence two": ["chills"]}}"#;
        let set = HighlightSet::from_validator_payload(raw).unwrap();
        assert_eq!(set.terms(), ["fever", "cough", "chills"]);
    }

    #[test]
    fn accepts_flat_array_payload() {
        let raw = r#"{"relevant_text": ["swelling", "left neck"]}"#;
        let set = HighlightSet::from_validator_payload(raw).unwrap();
        assert_eq!(set.terms(), ["swelling", "left neck"]);
    }

    #[test]
    fn repairs_invalid_escapes_before_giving_up() {
        let raw = r#"{"relevant_text": ["order \#3 given"]}"#;
        let set = HighlightSet::from_validator_payload(raw).unwrap();
        assert_eq!(set.terms(), ["order #3 given"]);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(HighlightSet::from_validator_payload("not json").is_err());
    }

    #[test]
    fn missing_relevant_text_yields_empty_set() {
        let set = HighlightSet::from_validator_payload(r#"{"other": 1}"#).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn empty_terms_are_discarded() {
        let set = HighlightSet::new(vec!["".to_string(), "  ".to_string(), "ok".to_string()]);
        assert_eq!(set.terms(), ["ok"]);
    }
}

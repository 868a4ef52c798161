//! Delta extraction from chat-completion stream events

use serde::Deserialize;

use crate::error::PipelineResult;

/// Data value marking the end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Streamed chat-completion chunk. Only the fields the pipeline reads are
/// decoded; everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaPayload {
    #[serde(default)]
    pub choices: Vec<DeltaChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl DeltaPayload {
    /// Text of `choices[0].delta.content`, empty when any link is missing
    pub fn into_fragment(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .unwrap_or_default()
    }
}

/// Outcome of extracting one event's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// The sentinel was seen; no further events should be processed
    Done,
    /// An incremental text fragment (possibly empty)
    Fragment(String),
}

/// Interpret one event's data field
pub fn extract(data: &str) -> PipelineResult<Extracted> {
    if data == DONE_SENTINEL {
        return Ok(Extracted::Done);
    }

    let payload: DeltaPayload = serde_json::from_str(data)?;
    Ok(Extracted::Fragment(payload.into_fragment()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn fragment(text: &str) -> Extracted {
        Extracted::Fragment(text.to_string())
    }

    #[test]
    fn test_done_sentinel() {
        assert_eq!(extract("[DONE]").unwrap(), Extracted::Done);
    }

    #[test]
    fn test_extracts_content() {
        let data = r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(extract(data).unwrap(), fragment("Hello"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let cases = [
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":null}}]}"#,
            r#"{"choices":[{"delta":null}]}"#,
            r#"{"choices":[{"finish_reason":"stop"}]}"#,
            r#"{"choices":[]}"#,
            r#"{"usage":{"total_tokens":3}}"#,
        ];
        for data in cases {
            assert_eq!(extract(data).unwrap(), fragment(""), "payload {}", data);
        }
    }

    #[test]
    fn test_only_first_choice_is_read() {
        let data = r#"{"choices":[{"delta":{"content":"a"}},{"delta":{"content":"b"}}]}"#;
        assert_eq!(extract(data).unwrap(), fragment("a"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = extract("{\"choices\": [").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        assert!(matches!(
            extract(r#"{"choices":"nope"}"#),
            Err(PipelineError::Parse(_))
        ));
        assert!(matches!(extract("42"), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_sentinel_is_exact_match() {
        assert!(matches!(extract(" [DONE]"), Err(PipelineError::Parse(_))));
    }
}

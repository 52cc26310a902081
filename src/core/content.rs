//! Generation Output Shapes
//!
//! Providers answer either with a plain string or with an ordered list of
//! typed fragments (text, images, tool calls, ...). Anything else is kept
//! as raw JSON so callers can still inspect it, but it carries no text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One typed piece of a structured reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

/// Raw result of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutput {
    PlainText(String),
    Fragments(Vec<ContentFragment>),
    Unrecognized(Value),
}

impl Default for GenerationOutput {
    fn default() -> Self {
        Self::Unrecognized(Value::Null)
    }
}

impl GenerationOutput {
    /// Classify an arbitrary JSON value. Never fails: unknown shapes land in
    /// `Unrecognized`.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(output) => output,
            Err(_) => Self::Unrecognized(value),
        }
    }

    /// Extract the reply text.
    ///
    /// Plain strings are returned as-is, fragment lists contribute the text
    /// of every `text` fragment in order, and any other shape yields an
    /// empty string.
    pub fn text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::Fragments(fragments) => fragments
                .iter()
                .filter(|f| f.is_text())
                .filter_map(|f| f.text.as_deref())
                .collect(),
            Self::Unrecognized(_) => String::new(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::PlainText(text) => text,
            other => other.text(),
        }
    }
}

impl From<String> for GenerationOutput {
    fn from(text: String) -> Self {
        Self::PlainText(text)
    }
}

impl From<&str> for GenerationOutput {
    fn from(text: &str) -> Self {
        Self::PlainText(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_is_used_as_is() {
        let output = GenerationOutput::from_value(json!("hello"));
        assert_eq!(output, GenerationOutput::PlainText("hello".to_string()));
        assert_eq!(output.text(), "hello");
    }

    #[test]
    fn test_fragments_keep_only_text_in_order() {
        let output = GenerationOutput::from_value(json!([
            {"type": "text", "text": "a"},
            {"type": "image", "image_url": {"url": "https://example.com/x.png"}},
            {"type": "text", "text": "b"}
        ]));
        assert!(matches!(output, GenerationOutput::Fragments(ref f) if f.len() == 3));
        assert_eq!(output.into_text(), "ab");
    }

    #[test]
    fn test_unrecognized_shapes_yield_empty_text() {
        assert_eq!(GenerationOutput::from_value(Value::Null).text(), "");
        assert_eq!(GenerationOutput::from_value(json!(42)).text(), "");
        assert_eq!(GenerationOutput::from_value(json!({"text": "x"})).text(), "");
        assert_eq!(GenerationOutput::from_value(json!([1, 2, 3])).text(), "");
        assert_eq!(GenerationOutput::default().into_text(), "");
    }

    #[test]
    fn test_text_fragment_without_text_contributes_nothing() {
        let output = GenerationOutput::Fragments(vec![
            ContentFragment {
                kind: "text".to_string(),
                text: None,
            },
            ContentFragment::text("ok"),
        ]);
        assert_eq!(output.text(), "ok");
    }
}

//! Ordered extraction rules for generation response bodies.
//!
//! Different providers put the generated text in different places. Rules are
//! tried in declaration order and the first one yielding non-blank text wins.

use serde_json::Value;

use crate::llm_client::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    /// `content[]` blocks with `type == "text"`, concatenated.
    MessageContent,
    /// `choices[0].message.content`
    ChatMessage,
    /// `choices[0].text`
    ChoiceText,
    OutputText,
    Completion,
    Text,
}

pub const EXTRACTION_RULES: [ExtractionRule; 6] = [
    ExtractionRule::MessageContent,
    ExtractionRule::ChatMessage,
    ExtractionRule::ChoiceText,
    ExtractionRule::OutputText,
    ExtractionRule::Completion,
    ExtractionRule::Text,
];

impl ExtractionRule {
    pub fn apply(self, body: &Value) -> Option<String> {
        let text = match self {
            ExtractionRule::MessageContent => {
                let blocks = body.get("content")?.as_array()?;
                let joined: String = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                Some(joined)
            }
            ExtractionRule::ChatMessage => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
            ExtractionRule::ChoiceText => body
                .pointer("/choices/0/text")
                .and_then(Value::as_str)
                .map(str::to_string),
            ExtractionRule::OutputText => string_field(body, "output_text"),
            ExtractionRule::Completion => string_field(body, "completion"),
            ExtractionRule::Text => string_field(body, "text"),
        }?;
        (!text.trim().is_empty()).then_some(text)
    }
}

fn string_field(body: &Value, name: &str) -> Option<String> {
    body.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Applies `EXTRACTION_RULES` in order.
///
/// A body that matches a known shape but carries only blank text is
/// `EmptyContent`; a body matching no shape at all is `UnrecognisedShape`.
pub fn extract_text(body: &Value) -> Result<String, GenerationError> {
    if let Some(text) = EXTRACTION_RULES.iter().find_map(|rule| rule.apply(body)) {
        return Ok(text);
    }
    let known_shape = ["content", "choices", "output_text", "completion", "text"]
        .iter()
        .any(|key| body.get(key).is_some());
    if known_shape {
        Err(GenerationError::EmptyContent)
    } else {
        Err(GenerationError::UnrecognisedShape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_shape_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "[HEADING]Sun" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "[END]" }
            ]
        });
        assert_eq!(extract_text(&body).unwrap(), "[HEADING]Sun[END]");
    }

    #[test]
    fn test_chat_and_legacy_shapes() {
        let chat = json!({ "choices": [{ "message": { "content": "chat" } }] });
        let legacy = json!({ "choices": [{ "text": "legacy" }] });
        let completion = json!({ "completion": "old" });
        assert_eq!(extract_text(&chat).unwrap(), "chat");
        assert_eq!(extract_text(&legacy).unwrap(), "legacy");
        assert_eq!(extract_text(&completion).unwrap(), "old");
    }

    #[test]
    fn test_first_non_empty_rule_wins() {
        let body = json!({
            "content": [{ "type": "text", "text": "   " }],
            "output_text": "fallback",
            "text": "last"
        });
        assert_eq!(extract_text(&body).unwrap(), "fallback");
    }

    #[test]
    fn test_blank_and_unknown_bodies_are_errors() {
        assert!(matches!(
            extract_text(&json!({ "text": "" })),
            Err(GenerationError::EmptyContent)
        ));
        assert!(matches!(
            extract_text(&json!({ "id": "msg_1" })),
            Err(GenerationError::UnrecognisedShape)
        ));
    }
}

use crate::errors::{GenieError, GenieResult};
use crate::types::ModelReply;
use serde::Deserialize;
use serde_json::Value;

/// Which reply variants a call path accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    QuestionOrAnswer,
    QuestionOnly,
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

/// Validate raw model output against the two-variant reply contract.
pub fn decode_reply(raw: &str, allowed: ReplyShape) -> GenieResult<ModelReply> {
    if raw.trim().is_empty() {
        return Err(GenieError::EmptyUpstreamResponse);
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| GenieError::contract(format!("not a JSON object: {}", e), raw))?;
    if !value.is_object() {
        return Err(GenieError::contract("not a JSON object", raw));
    }
    let parsed: RawReply = serde_json::from_value(value)
        .map_err(|e| GenieError::contract(format!("malformed fields: {}", e), raw))?;

    let kind = parsed
        .kind
        .ok_or_else(|| GenieError::contract("missing `type`", raw))?;

    let text = match parsed.text {
        Some(text) if !text.trim().is_empty() => text,
        Some(_) => return Err(GenieError::contract("`text` is empty", raw)),
        None => return Err(GenieError::contract("missing `text`", raw)),
    };

    let reply = match kind.as_str() {
        "question" => ModelReply::Question { text },
        "answer" => ModelReply::Answer { text },
        other => {
            return Err(GenieError::contract(
                format!("unknown `type` {:?}", other),
                raw,
            ))
        }
    };

    if allowed == ReplyShape::QuestionOnly && !reply.is_question() {
        return Err(GenieError::contract("expected a question, got an answer", raw));
    }

    Ok(reply)
}

use serde::{Deserialize, Serialize};

/// One completed question/answer round. Order in the history is dialogue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "q", alias = "question")]
    pub question: String,
    #[serde(rename = "a", alias = "answer")]
    pub answer: String,
}

impl HistoryEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Body of every dialogue request. The client owns the conversation and
/// sends it whole each time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueRequest {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// The only two shapes the model is allowed to reply with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelReply {
    Question { text: String },
    Answer { text: String },
}

impl ModelReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Question { text } | Self::Answer { text } => text,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Self::Question { .. })
    }
}

//------------------------------------------------------------------------------
// Chat completion wire types (OpenAI-compatible)
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object",
        }
    }
}

/// What the turn processor hands to a [`crate::client::CompletionClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
    /// System instructions plus a single user directive, in strict JSON mode.
    pub fn instructed(model: &str, instructions: String, directive: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(instructions), ChatMessage::user(directive)],
            response_format: Some(ResponseFormat::json_object()),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
    }
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if there is any non-blank content.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Deserialize, Debug)]
pub struct UpstreamErrorResponse {
    pub error: UpstreamErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct UpstreamErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

use serde::{Deserialize, Serialize};

// --- Messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set by the API when a structured-output request is declined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            refusal: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            refusal: None,
        }
    }
}

// --- Requests ---

/// Output cap. Reasoning models only accept `max_completion_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TokenLimit {
    MaxTokens(u32),
    MaxCompletionTokens(u32),
}

impl TokenLimit {
    fn for_model(model: &str, limit: u32) -> Self {
        if is_reasoning_model(model) {
            TokenLimit::MaxCompletionTokens(limit)
        } else {
            TokenLimit::MaxTokens(limit)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub limit: TokenLimit,
}

impl ChatRequest {
    /// Reasoning models reject `temperature`; it is dropped for them.
    pub fn new(
        model: &str,
        messages: Vec<WireMessage>,
        temperature: Option<f32>,
        limit: u32,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages,
            temperature: temperature.filter(|_| !is_reasoning_model(model)),
            limit: TokenLimit::for_model(model, limit),
        }
    }
}

/// Chat request constrained to a strict JSON schema, sampled at temperature 0
/// where the model allows it.
#[derive(Debug, Serialize)]
pub(crate) struct StructuredRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub response_format: ResponseFormat,
}

impl StructuredRequest {
    pub fn new(model: &str, messages: Vec<WireMessage>, schema: serde_json::Value) -> Self {
        Self {
            model: model.to_string(),
            messages,
            temperature: (!is_reasoning_model(model)).then_some(0.0),
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "structured_response",
                    strict: true,
                    schema,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSchemaFormat {
    pub name: &'static str,
    pub strict: bool,
    pub schema: serde_json::Value,
}

// --- Response ---

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Content of the first choice, if the model produced any.
    pub fn first_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Choice {
    pub message: WireMessage,
}

/// o-series and gpt-5 models: no `temperature`, `max_completion_tokens` only.
pub(crate) fn is_reasoning_model(model: &str) -> bool {
    ["o1", "o3", "o4", "gpt-5"].iter().any(|p| model.starts_with(p))
        || model.contains("-o1")
        || model.contains("-o3")
}

use crate::utils::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Background jobs Open WebUI runs through the regular chat endpoint,
/// tagged with `metadata.task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundTask {
    TitleGeneration,
    TagsGeneration,
    AutocompleteGeneration,
    Other(String),
}

impl BackgroundTask {
    pub fn parse(task: &str) -> Self {
        match task {
            "title_generation" => BackgroundTask::TitleGeneration,
            "tags_generation" => BackgroundTask::TagsGeneration,
            "autocomplete_generation" => BackgroundTask::AutocompleteGeneration,
            other => BackgroundTask::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BackgroundTask::TitleGeneration => "title_generation",
            BackgroundTask::TagsGeneration => "tags_generation",
            BackgroundTask::AutocompleteGeneration => "autocomplete_generation",
            BackgroundTask::Other(task) => task,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    /// e.g. `index`; echoed back unchanged in the follow-up request.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolFunctionCall,
    /// e.g. `id`; echoed back unchanged in the follow-up request.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn tool_result(tool_name: &str, content: impl Into<String>) -> Self {
        let mut message = Self::with_role("tool", content);
        message
            .extra
            .insert("tool_name".to_string(), Value::String(tool_name.to_string()));
        message
    }

    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A request body from the frontend. Kept as a raw JSON object so fields the
/// relay does not know about are forwarded untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    body: Map<String, Value>,
}

impl RelayRequest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            other => Err(RelayError::invalid_request(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.body.get("model").and_then(Value::as_str)
    }

    pub fn set_model(&mut self, model: &str) {
        self.body
            .insert("model".to_string(), Value::String(model.to_string()));
    }

    /// Ollama streams unless told otherwise.
    pub fn is_streaming(&self) -> bool {
        self.body
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn set_streaming(&mut self, stream: bool) {
        self.body.insert("stream".to_string(), Value::Bool(stream));
    }

    pub fn background_task(&self) -> Option<BackgroundTask> {
        self.body
            .get("metadata")
            .and_then(|metadata| metadata.get("task"))
            .and_then(Value::as_str)
            .map(BackgroundTask::parse)
    }

    pub fn has_messages(&self) -> bool {
        matches!(self.body.get("messages"), Some(Value::Array(_)))
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>> {
        match self.body.get("messages") {
            Some(messages) => Ok(serde_json::from_value(messages.clone())?),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_messages(&mut self, messages: &[ChatMessage]) -> Result<()> {
        self.body
            .insert("messages".to_string(), serde_json::to_value(messages)?);
        Ok(())
    }

    /// Inserts `prompt` as the first message unless a system message exists.
    /// Returns whether a message was inserted.
    pub fn ensure_system_message(&mut self, prompt: &str) -> bool {
        let Some(Value::Array(messages)) = self.body.get_mut("messages") else {
            return false;
        };

        let has_system = messages
            .iter()
            .any(|message| message.get("role").and_then(Value::as_str) == Some("system"));
        if has_system {
            return false;
        }

        messages.insert(
            0,
            serde_json::json!({ "role": "system", "content": prompt }),
        );
        true
    }

    pub fn prefix_prompt(&mut self, prefix: &str) -> bool {
        match self.body.get_mut("prompt") {
            Some(Value::String(prompt)) => {
                prompt.insert_str(0, prefix);
                true
            }
            _ => false,
        }
    }

    pub fn set_tools(&mut self, tools: Vec<Value>) {
        self.body.insert("tools".to_string(), Value::Array(tools));
    }

    pub fn remove_tools(&mut self) {
        self.body.remove("tools");
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.body)?)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use crate::config::RelayConfig;
use crate::core::relay::{relay_response, RelayResponse, JSON, NDJSON};
use crate::domain::model::{ChatMessage, RelayRequest};
use crate::domain::ports::{InferenceBackend, ToolExecutor};
use crate::utils::error::{RelayError, Result};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ToolLoopSettings {
    pub system_prompt: String,
    pub default_model: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl From<&RelayConfig> for ToolLoopSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            system_prompt: config.tools.system_prompt.clone(),
            default_model: config.chat.default_model.clone(),
            max_retries: config.tools.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

enum ToolOutcome {
    /// The model replied without asking for a tool.
    Answered(Value),
    /// Tools ran; this request carries their results back to the model.
    FollowUp(RelayRequest),
}

/// Chat with tool use: ask the model with tools attached, run whatever it
/// calls, then let it answer with the results in context.
pub struct ToolCallingChat<'a> {
    backend: &'a dyn InferenceBackend,
    tools: &'a dyn ToolExecutor,
    settings: &'a ToolLoopSettings,
}

impl<'a> ToolCallingChat<'a> {
    pub fn new(
        backend: &'a dyn InferenceBackend,
        tools: &'a dyn ToolExecutor,
        settings: &'a ToolLoopSettings,
    ) -> Self {
        Self {
            backend,
            tools,
            settings,
        }
    }

    pub async fn run(&self, mut request: RelayRequest) -> Result<RelayResponse> {
        let streaming = request.is_streaming();
        request.ensure_system_message(&self.settings.system_prompt);
        if request.model().is_none() {
            request.set_model(&self.settings.default_model);
        }

        let mut last_error = None;
        for attempt in 1..=self.settings.max_retries {
            match self.attempt(&request).await {
                Ok(outcome) => return self.finish(outcome, streaming).await,
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Tool call attempt {}/{} failed: {}",
                        attempt,
                        self.settings.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.settings.max_retries {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        Err(RelayError::ToolRetriesExhausted {
            attempts: self.settings.max_retries,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        })
    }

    async fn attempt(&self, request: &RelayRequest) -> Result<ToolOutcome> {
        let mut probe = request.clone();
        probe.set_tools(self.tools.definitions());

        let reply = self.backend.chat_once(&probe).await?;
        let message: ChatMessage = match reply.get("message") {
            Some(message) => serde_json::from_value(message.clone())?,
            None => {
                return Err(RelayError::tool(
                    "chat",
                    "backend reply carries no message",
                ))
            }
        };

        if message.tool_calls.is_empty() {
            tracing::debug!("Model answered without calling a tool");
            return Ok(ToolOutcome::Answered(reply));
        }

        let calls = message.tool_calls.clone();
        let mut messages = request.messages()?;
        messages.push(message);

        for call in &calls {
            let result = self.tools.execute(call).await?;
            messages.push(ChatMessage::tool_result(
                &call.function.name,
                serde_json::to_string(&result)?,
            ));
        }
        tracing::info!("✅ Executed {} tool call(s)", calls.len());

        let mut follow_up = request.clone();
        follow_up.remove_tools();
        follow_up.set_messages(&messages)?;
        Ok(ToolOutcome::FollowUp(follow_up))
    }

    async fn finish(&self, outcome: ToolOutcome, streaming: bool) -> Result<RelayResponse> {
        match outcome {
            ToolOutcome::Answered(reply) => {
                let mut body = serde_json::to_vec(&reply)?;
                if streaming {
                    // A complete reply is a valid single-chunk stream.
                    body.push(b'\n');
                    Ok(RelayResponse::full(200, NDJSON, body))
                } else {
                    Ok(RelayResponse::full(200, JSON, body))
                }
            }
            ToolOutcome::FollowUp(request) => {
                let response = self.backend.chat(&request).await?;
                relay_response(response, streaming).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::relay::RelayBody;
    use crate::domain::model::ToolCall;
    use crate::domain::ports::{BackendResponse, ForwardRequest};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use futures::{stream, StreamExt};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned `chat_once` replies and records follow-up requests.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<Value>>>,
        follow_ups: Mutex<Vec<RelayRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<Value>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                follow_ups: Mutex::new(Vec::new()),
            }
        }

        fn stream_response(body: &'static [u8]) -> BackendResponse {
            BackendResponse {
                status: 200,
                content_type: Some(NDJSON.to_string()),
                body: stream::iter(vec![Ok(Bytes::from_static(body))]).boxed(),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        fn base_url(&self) -> &str {
            "http://scripted"
        }

        async fn list_models(&self) -> Result<Value> {
            Ok(json!({"models": []}))
        }

        async fn chat(&self, request: &RelayRequest) -> Result<BackendResponse> {
            self.follow_ups.lock().unwrap().push(request.clone());
            Ok(Self::stream_response(b"{\"done\":true}\n"))
        }

        async fn chat_once(&self, _request: &RelayRequest) -> Result<Value> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RelayError::tool("chat", "script exhausted")))
        }

        async fn generate(&self, _request: &RelayRequest) -> Result<BackendResponse> {
            Ok(Self::stream_response(b"{\"done\":true}\n"))
        }

        async fn forward(&self, _request: ForwardRequest) -> Result<BackendResponse> {
            Ok(Self::stream_response(b"{}"))
        }
    }

    struct ScoreTool;

    #[async_trait]
    impl ToolExecutor for ScoreTool {
        fn definitions(&self) -> Vec<Value> {
            vec![json!({"type": "function", "function": {"name": "get_score"}})]
        }

        async fn execute(&self, call: &ToolCall) -> Result<Value> {
            match call.function.name.as_str() {
                "get_score" => Ok(json!({"home": 110, "away": 104})),
                other => Err(RelayError::UnknownTool {
                    name: other.to_string(),
                }),
            }
        }
    }

    fn settings(max_retries: u32) -> ToolLoopSettings {
        ToolLoopSettings {
            system_prompt: "Use tools.".to_string(),
            default_model: "llama3.2:1b".to_string(),
            max_retries,
            retry_delay: Duration::from_millis(0),
        }
    }

    fn request(stream: bool) -> RelayRequest {
        RelayRequest::from_value(json!({
            "stream": stream,
            "messages": [{"role": "user", "content": "What was the score?"}]
        }))
        .unwrap()
    }

    fn calls(name: &str) -> Value {
        json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": name, "arguments": {}}}]
            }
        })
    }

    #[tokio::test]
    async fn test_follow_up_carries_tool_results() {
        let backend = ScriptedBackend::new(vec![Ok(calls("get_score"))]);
        let settings = settings(3);

        let response = ToolCallingChat::new(&backend, &ScoreTool, &settings)
            .run(request(true))
            .await
            .unwrap();
        assert!(matches!(response.body, RelayBody::Stream(_)));

        let follow_ups = backend.follow_ups.lock().unwrap();
        assert_eq!(follow_ups.len(), 1);
        let follow_up = &follow_ups[0];
        assert_eq!(follow_up.model(), Some("llama3.2:1b"));
        assert!(follow_up.as_value().get("tools").is_none());

        let messages = follow_up.messages().unwrap();
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool"]);
        assert_eq!(messages[0].content, "Use tools.");
        assert_eq!(messages[3].extra["tool_name"], json!("get_score"));
        let result: Value = serde_json::from_str(&messages[3].content).unwrap();
        assert_eq!(result, json!({"home": 110, "away": 104}));
    }

    #[tokio::test]
    async fn test_recovers_after_a_failed_attempt() {
        let backend = ScriptedBackend::new(vec![
            Err(RelayError::BackendStatus {
                status: 500,
                body: "overloaded".to_string(),
            }),
            Ok(json!({"message": {"role": "assistant", "content": "110 to 104."}})),
        ]);
        let settings = settings(3);

        let response = ToolCallingChat::new(&backend, &ScoreTool, &settings)
            .run(request(false))
            .await
            .unwrap();

        assert_eq!(response.content_type.as_deref(), Some(JSON));
        match response.body {
            RelayBody::Full(body) => {
                let reply: Value = serde_json::from_slice(&body).unwrap();
                assert_eq!(reply["message"]["content"], json!("110 to 104."));
            }
            RelayBody::Stream(_) => panic!("expected a complete body"),
        }
        assert!(backend.follow_ups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_last_error_when_retries_run_out() {
        let backend = ScriptedBackend::new(vec![
            Ok(calls("get_weather")),
            Ok(calls("get_weather")),
        ]);
        let settings = settings(2);

        let error = ToolCallingChat::new(&backend, &ScoreTool, &settings)
            .run(request(true))
            .await
            .err()
            .unwrap();

        assert_eq!(
            error.to_string(),
            "Failed to execute tool call after 2 attempts: Unknown tool: get_weather"
        );
    }
}

use crate::adapters::balldontlie::BalldontlieClient;
use crate::adapters::ollama::OllamaClient;
use crate::config::RelayConfig;
use crate::core::tool_loop::{ToolCallingChat, ToolLoopSettings};
use crate::domain::model::RelayRequest;
use crate::domain::ports::{BackendResponse, ByteStream, ForwardRequest, InferenceBackend, ToolExecutor};
use crate::tools::nba::{register_nba_tools, NbaToolkit};
use crate::tools::ToolRegistry;
use crate::utils::error::Result;
use axum::body::Bytes;
use futures::{future, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NDJSON: &str = "application/x-ndjson";
pub const JSON: &str = "application/json";

pub enum RelayBody {
    Stream(ByteStream),
    Full(Bytes),
}

/// What the HTTP layer sends back to the frontend.
pub struct RelayResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: RelayBody,
}

impl RelayResponse {
    pub fn full(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: RelayBody::Full(body.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_prompt: Option<String>,
    pub prompt_prefix: Option<String>,
    pub task_model: Option<String>,
    pub tool_loop: ToolLoopSettings,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            system_prompt: config.system_prompt().map(str::to_string),
            prompt_prefix: config.prompt_prefix().map(str::to_string),
            task_model: config.chat.task_model.clone(),
            tool_loop: ToolLoopSettings::from(config),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// One `{"error": ...}` NDJSON line, the way a failed stream is reported to the frontend.
pub fn error_line(message: &str) -> Bytes {
    let mut line = json!({ "error": message }).to_string().into_bytes();
    line.push(b'\n');
    Bytes::from(line)
}

/// Passes chunks through until the first failure, which becomes a final error line.
pub fn guard_stream(body: ByteStream) -> ByteStream {
    body.scan(false, |failed, chunk| {
        if *failed {
            return future::ready(None);
        }
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("❌ Backend stream failed: {}", e);
                *failed = true;
                error_line(&e.to_string())
            }
        };
        future::ready(Some(Ok(chunk)))
    })
    .boxed()
}

pub async fn collect_body(mut body: ByteStream) -> Result<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buffer))
}

/// Turns a backend chat/generate response into the frontend response.
/// Failures are passed through with the backend's status and body.
pub async fn relay_response(response: BackendResponse, streaming: bool) -> Result<RelayResponse> {
    if !response.is_success() {
        tracing::warn!("⚠️ Backend answered {}", response.status);
        let content_type = response.content_type.unwrap_or_else(|| JSON.to_string());
        let body = collect_body(response.body).await?;
        return Ok(RelayResponse {
            status: response.status,
            content_type: Some(content_type),
            body: RelayBody::Full(body),
        });
    }

    if streaming {
        Ok(RelayResponse {
            status: response.status,
            content_type: Some(NDJSON.to_string()),
            body: RelayBody::Stream(guard_stream(response.body)),
        })
    } else {
        let body = collect_body(response.body).await?;
        Ok(RelayResponse::full(response.status, JSON, body))
    }
}

#[derive(Clone)]
pub struct RelayService {
    backend: Arc<dyn InferenceBackend>,
    tools: Option<Arc<dyn ToolExecutor>>,
    settings: RelaySettings,
}

impl RelayService {
    pub fn new(backend: Arc<dyn InferenceBackend>, settings: RelaySettings) -> Self {
        Self {
            backend,
            tools: None,
            settings,
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let backend = OllamaClient::from_config(config)?;
        let service = Self::new(Arc::new(backend), RelaySettings::from(config));

        if !config.tools.enabled {
            return Ok(service);
        }

        let toolkit = Arc::new(NbaToolkit::new(BalldontlieClient::from_config(config)?));
        let mut registry = ToolRegistry::new();
        register_nba_tools(&mut registry, toolkit);
        tracing::info!("🔧 Tool calling enabled with {} tools: {}", registry.len(), registry.names().join(", "));

        Ok(service.with_tools(Arc::new(registry)))
    }

    pub fn backend_url(&self) -> &str {
        self.backend.base_url()
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools.is_some()
    }

    pub fn version(&self) -> Value {
        json!({ "version": env!("CARGO_PKG_VERSION"), "custom_server": true })
    }

    pub async fn list_models(&self) -> Result<Value> {
        let models = self.backend.list_models().await?;
        let count = models
            .get("models")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        tracing::debug!("📋 Backend reports {} models", count);
        Ok(models)
    }

    pub async fn chat(&self, body: &[u8]) -> Result<RelayResponse> {
        let mut request = RelayRequest::from_slice(body)?;
        let streaming = request.is_streaming();
        let task = request.background_task();

        match &task {
            Some(task) => tracing::info!("📝 Background task: {}", task.as_str()),
            None => tracing::info!(
                "💬 Chat request (model: {}, stream: {})",
                request.model().unwrap_or("<none>"),
                streaming
            ),
        }

        if let (Some(_), Some(task_model)) = (&task, &self.settings.task_model) {
            request.set_model(task_model);
        }

        if let (Some(tools), None) = (&self.tools, &task) {
            return ToolCallingChat::new(
                self.backend.as_ref(),
                tools.as_ref(),
                &self.settings.tool_loop,
            )
            .run(request)
            .await;
        }

        if let Some(prompt) = &self.settings.system_prompt {
            if request.ensure_system_message(prompt) {
                tracing::debug!("Injected default system prompt");
            }
        }

        let response = self.backend.chat(&request).await?;
        relay_response(response, streaming).await
    }

    pub async fn generate(&self, body: &[u8]) -> Result<RelayResponse> {
        let mut request = RelayRequest::from_slice(body)?;
        let streaming = request.is_streaming();
        tracing::info!(
            "✍️ Generate request (model: {}, stream: {})",
            request.model().unwrap_or("<none>"),
            streaming
        );

        if let Some(task) = request.background_task() {
            tracing::info!("📝 Background task: {}", task.as_str());
            if let Some(task_model) = &self.settings.task_model {
                request.set_model(task_model);
            }
        }

        if let Some(prefix) = &self.settings.prompt_prefix {
            request.prefix_prompt(prefix);
        }

        let response = self.backend.generate(&request).await?;
        relay_response(response, streaming).await
    }

    /// Any other endpoint goes to the backend untouched.
    pub async fn forward(&self, request: ForwardRequest) -> Result<RelayResponse> {
        tracing::info!("↪️ {} {}", request.method, request.path_and_query);
        let response = self.backend.forward(request).await?;

        Ok(RelayResponse {
            status: response.status,
            content_type: response.content_type,
            body: RelayBody::Stream(guard_stream(response.body)),
        })
    }
}

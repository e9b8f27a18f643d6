use crate::domain::model::{RelayRequest, ToolCall};
use crate::utils::error::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A response from the inference backend whose body has not been read yet.
pub struct BackendResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// A raw request relayed to an arbitrary backend path.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: String,
    /// Path and query, e.g. `/api/show?verbose=true`.
    pub path_and_query: String,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn base_url(&self) -> &str;
    async fn list_models(&self) -> Result<Value>;
    async fn chat(&self, request: &RelayRequest) -> Result<BackendResponse>;
    /// Non-streaming chat returning the parsed reply document.
    async fn chat_once(&self, request: &RelayRequest) -> Result<Value>;
    async fn generate(&self, request: &RelayRequest) -> Result<BackendResponse>;
    async fn forward(&self, request: ForwardRequest) -> Result<BackendResponse>;
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn call(&self, arguments: Value) -> Result<Value>;
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<Value>;
    async fn execute(&self, call: &ToolCall) -> Result<Value>;
}

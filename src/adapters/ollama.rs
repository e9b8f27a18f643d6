use crate::config::RelayConfig;
use crate::domain::model::RelayRequest;
use crate::domain::ports::{BackendResponse, ForwardRequest, InferenceBackend};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;

/// HTTP client for an Ollama-compatible inference server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let mut builder = Client::builder().connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: config.backend.url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, request: &RelayRequest) -> Result<BackendResponse> {
        let url = self.url(path);
        tracing::debug!("Relaying POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(request.to_bytes()?)
            .send()
            .await?;

        Ok(into_backend_response(response))
    }
}

fn into_backend_response(response: reqwest::Response) -> BackendResponse {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    tracing::debug!("Backend responded with status {}", status);

    BackendResponse {
        status,
        content_type,
        body: response.bytes_stream().map_err(RelayError::from).boxed(),
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Result<Value> {
        let url = self.url("/api/tags");
        tracing::debug!("Fetching model list from {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn chat(&self, request: &RelayRequest) -> Result<BackendResponse> {
        self.post_json("/api/chat", request).await
    }

    async fn chat_once(&self, request: &RelayRequest) -> Result<Value> {
        let mut request = request.clone();
        request.set_streaming(false);

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request.as_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn generate(&self, request: &RelayRequest) -> Result<BackendResponse> {
        self.post_json("/api/generate", request).await
    }

    async fn forward(&self, request: ForwardRequest) -> Result<BackendResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            RelayError::invalid_request(format!("unsupported method {}", request.method))
        })?;
        let url = self.url(&request.path_and_query);
        tracing::debug!("Forwarding {} {}", method, url);

        let mut builder = self.client.request(method, &url);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        Ok(into_backend_response(response))
    }
}

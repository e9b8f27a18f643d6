use crate::config::RelayConfig;
use crate::utils::error::{RelayError, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Thin client for the balldontlie NBA API. Every list endpoint answers
/// `{"data": [...], "meta": {...}}`; callers only ever see `data`.
#[derive(Debug, Clone)]
pub struct BalldontlieClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl BalldontlieClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let api_key = config.balldontlie_api_key();
        if api_key.is_none() {
            tracing::warn!("⚠️ No balldontlie API key configured; sports tools will likely be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.tools.balldontlie.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.tools.balldontlie.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// GET `path` with repeated query pairs (array params use the `name[]` form).
    /// Returns the first page only.
    pub async fn get_data(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let (items, _) = self.get_page(path, query, None).await?;
        Ok(items)
    }

    /// Like `get_data`, following `meta.next_cursor` until the last page.
    pub async fn get_all_data(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let (items, next_cursor) = self.get_page(path, query, cursor.as_deref()).await?;
            all_items.extend(items);

            match next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!("🏀 {} returned {} items in total", path, all_items.len());
        Ok(all_items)
    }

    async fn get_page(
        &self,
        path: &str,
        query: &[(&str, String)],
        cursor: Option<&str>,
    ) -> Result<(Vec<Value>, Option<String>)> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("🏀 GET {} {:?} (cursor: {:?})", url, query, cursor);

        let mut request = self.client.get(&url).query(query);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::tool(
                "balldontlie",
                format!("{} returned {}: {}", path, status, body),
            ));
        }

        let payload: Value = response.json().await?;
        let items = match payload.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };
        Ok((items, next_cursor(&payload)))
    }
}

/// `meta.next_cursor` arrives as a number, but accept a string too.
fn next_cursor(payload: &Value) -> Option<String> {
    match payload.get("meta")?.get("next_cursor")? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_data_sends_key_and_unwraps_data() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/teams")
                    .header("authorization", "test-key");
                then.status(200).json_body(json!({
                    "data": [{"id": 10, "name": "Warriors"}],
                    "meta": {"per_page": 25}
                }));
            })
            .await;

        let client = BalldontlieClient::new(server.base_url(), Some("test-key".to_string()));
        let teams = client.get_data("/teams", &[]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(teams, vec![json!({"id": 10, "name": "Warriors"})]);
    }

    #[tokio::test]
    async fn test_get_data_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/standings");
                then.status(401).body("Unauthorized");
            })
            .await;

        let client = BalldontlieClient::new(server.base_url(), None);
        let err = client
            .get_data("/standings", &[("season", "2023".to_string())])
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::ToolError { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_get_all_data_follows_cursor() {
        let server = MockServer::start_async().await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/player_injuries")
                    .query_param("cursor", "25");
                then.status(200).json_body(json!({
                    "data": [{"player": {"id": 3}}],
                    "meta": {"per_page": 25}
                }));
            })
            .await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/player_injuries");
                then.status(200).json_body(json!({
                    "data": [{"player": {"id": 1}}, {"player": {"id": 2}}],
                    "meta": {"next_cursor": 25, "per_page": 25}
                }));
            })
            .await;

        let client = BalldontlieClient::new(server.base_url(), None);
        let injuries = client.get_all_data("/player_injuries", &[]).await.unwrap();

        assert_eq!(injuries.len(), 3);
        assert_eq!(injuries[2]["player"]["id"], json!(3));
        assert_eq!(first.hits_async().await, 1);
        assert_eq!(second.hits_async().await, 1);
    }

    #[test]
    fn test_next_cursor_forms() {
        assert_eq!(next_cursor(&json!({"meta": {"next_cursor": 500}})), Some("500".to_string()));
        assert_eq!(next_cursor(&json!({"meta": {"next_cursor": "abc"}})), Some("abc".to_string()));
        assert_eq!(next_cursor(&json!({"meta": {"next_cursor": null}})), None);
        assert_eq!(next_cursor(&json!({"data": []})), None);
    }
}

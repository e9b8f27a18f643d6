pub mod nba;

use crate::domain::model::ToolCall;
use crate::domain::ports::{Tool, ToolExecutor};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Ordered set of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name twice replaces the earlier tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value> {
        let name = call.function.name.as_str();
        let tool = self.get(name).ok_or_else(|| RelayError::UnknownTool {
            name: name.to_string(),
        })?;

        // Some models send arguments as a JSON-encoded string.
        let arguments = match &call.function.arguments {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
            other => other.clone(),
        };

        tracing::info!("🔧 Calling tool {} with {}", name, arguments);
        tool.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ToolFunctionCall;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments back."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn call(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            function: ToolFunctionCall {
                name: name.to_string(),
                arguments,
                extra: Default::default(),
            },
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_definitions_use_ollama_function_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0]["type"], json!("function"));
        assert_eq!(definitions[0]["function"]["name"], json!("echo"));
        assert_eq!(
            definitions[0]["function"]["parameters"]["properties"]["text"]["type"],
            json!("string")
        );
    }

    #[tokio::test]
    async fn test_execute_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);

        let result = registry
            .execute(&call("echo", json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"text": "hi"}));

        let result = registry
            .execute(&call("echo", json!(r#"{"text": "encoded"}"#)))
            .await
            .unwrap();
        assert_eq!(result, json!({"text": "encoded"}));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute(&call("get_weather", json!({}))).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownTool { ref name } if name == "get_weather"));
    }
}

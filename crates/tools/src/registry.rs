//! Tool trait, parameter validation, and the registry that backs the
//! agent's `tool_call` state (§4.3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sa_domain::error::{Error, Result};
use sa_domain::tool::ToolDefinition;
use serde::Serialize;
use serde_json::Value;

/// Per-invocation context passed to `execute` — the session/user a tool
/// call is scoped to, used by tools that talk to session-scoped
/// collaborators (memory, CRM).
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResultMetadata {
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
}

/// Atomic result of one tool invocation — exactly what's persisted into
/// the `ToolExecution` row's terminal state and emitted on `tool_result`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: ToolResultMetadata,
}

impl ToolResult {
    pub fn ok(tool_name: &str, data: Value, started: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ToolResultMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                tool_name: tool_name.to_string(),
            },
        }
    }

    pub fn err(tool_name: &str, error: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ToolResultMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                tool_name: tool_name.to_string(),
            },
        }
    }
}

/// A named, schema-described capability the agent FSM can invoke from its
/// `tool_call` state.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-schema-like parameter contract: `{type, properties, required}`,
    /// sufficient to validate inputs and render a model-facing signature.
    fn parameters(&self) -> Value;
    /// e.g. `["streams"]` — absent means the pipeline treats the result as
    /// a single atomic event.
    fn capabilities(&self) -> &[&str] {
        &[]
    }
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Validates `params` against a tool's declared parameter schema before
/// `execute` is called. Supports the subset of JSON Schema the built-in
/// tools actually use: object type, `required`, and per-property `type`/
/// `enum` checks.
pub fn validate_params(schema: &Value, params: &Value) -> std::result::Result<(), String> {
    let obj = params
        .as_object()
        .ok_or_else(|| "parameters must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for req in required {
            let Some(name) = req.as_str() else { continue };
            if !obj.contains_key(name) {
                return Err(format!("missing required parameter '{name}'"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            let Some(prop_schema) = props.get(key) else {
                continue;
            };
            if let Some(expected_ty) = prop_schema.get("type").and_then(|t| t.as_str()) {
                if !value_matches_type(value, expected_ty) {
                    return Err(format!(
                        "parameter '{key}' expected type '{expected_ty}'"
                    ));
                }
            }
            if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                if !allowed.contains(value) {
                    return Err(format!("parameter '{key}' is not one of the allowed values"));
                }
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, ty: &str) -> bool {
    match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Registry of every tool the gateway knows how to run. Agents see only
/// the subset their `tool_policy` allows (filtering happens one layer up,
/// against `definitions()`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All registered tools as model-facing `ToolDefinition`s, regardless
    /// of any agent's tool policy.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate parameters, then run the tool. Validation failures never
    /// invoke `execute` and surface as `ErrorKind.validation`.
    pub async fn invoke(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tool '{name}' not registered")))?;

        if let Err(msg) = validate_params(&tool.parameters(), &params) {
            return Err(Error::Validation(format!("{name}: {msg}")));
        }

        Ok(tool.execute(params, ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            })
        }
        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            let started = Instant::now();
            ToolResult::ok("echo", params, started)
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            user_id: Some("u1".into()),
        }
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let result = registry
            .invoke("echo", json!({"text": "hi"}), &ctx())
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_required_param_is_validation_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let err = registry.invoke("echo", json!({}), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), sa_domain::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("nope", json!({}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), sa_domain::error::ErrorKind::NotFound);
    }

    #[test]
    fn definitions_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs[0].name, "echo");
    }
}

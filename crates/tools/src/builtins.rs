//! Concrete built-in tools (§4.3), grounded on the teacher's
//! `build_tool_definitions` / `dispatch_tool` shape: a static list of
//! `ToolDefinition`s backed by one `Tool` impl apiece, dispatched by name.

use std::time::Instant;

use async_trait::async_trait;
use sa_memory::MemoryGateway;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::registry::{Tool, ToolContext, ToolResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// memory.search / memory.ingest — thin wrappers over MemoryGateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemorySearchTool {
    gateway: Arc<dyn MemoryGateway>,
}

impl MemorySearchTool {
    pub fn new(gateway: Arc<dyn MemoryGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory.search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for content relevant to a query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Max results (default 5)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let limit = params
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(5) as usize;
        let user_id = ctx.user_id.as_deref().unwrap_or("");

        let (snippets, status) = self
            .gateway
            .query_relevant(&ctx.session_id, user_id, query, limit)
            .await;

        if status.status == "degraded" {
            return ToolResult::err(
                "memory.search",
                format!("memory search degraded: {}", status.reason.unwrap_or_default()),
                started,
            );
        }
        ToolResult::ok("memory.search", json!({ "results": snippets }), started)
    }
}

pub struct MemoryIngestTool {
    gateway: Arc<dyn MemoryGateway>,
}

impl MemoryIngestTool {
    pub fn new(gateway: Arc<dyn MemoryGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for MemoryIngestTool {
    fn name(&self) -> &str {
        "memory.ingest"
    }

    fn description(&self) -> &str {
        "Store a fact or note in long-term memory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Content to store" }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let user_id = ctx.user_id.as_deref().unwrap_or("");

        let status = self
            .gateway
            .add_turn(
                &ctx.session_id,
                user_id,
                &[sa_memory::TurnMessage {
                    role: "user",
                    content,
                }],
            )
            .await;

        if status.status == "degraded" {
            return ToolResult::err(
                "memory.ingest",
                format!("memory ingest degraded: {}", status.reason.unwrap_or_default()),
                started,
            );
        }
        ToolResult::ok("memory.ingest", json!({ "stored": true }), started)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// web.search — stub (external web access is collaborator surface, not a
// built-in capability; teacher pattern: stub_tool returning success:false
// with a suggestion)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web.search"
    }

    fn description(&self) -> &str {
        "Search the web. Currently unavailable — returns an error with alternatives."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        ToolResult {
            success: false,
            data: None,
            error: Some("web search is not configured for this deployment".into()),
            metadata: crate::registry::ToolResultMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                timestamp: chrono::Utc::now(),
                tool_name: "web.search".into(),
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CRM collaborator tools — interface-only per spec §6; a narrow client
// over a fixed in-memory contact/deal set, just enough to exercise the
// crm agent's tool subset end to end.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy)]
struct Contact {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    company: &'static str,
}

const CONTACTS: &[Contact] = &[
    Contact {
        id: "cst_001",
        name: "Peter Kelly",
        email: "peter.kelly@example.com",
        company: "Northwind Traders",
    },
    Contact {
        id: "cst_002",
        name: "Amara Osei",
        email: "amara.osei@example.com",
        company: "Contoso Ltd",
    },
];

pub struct ContactSearchTool;

#[async_trait]
impl Tool for ContactSearchTool {
    fn name(&self) -> &str {
        "contact_search"
    }

    fn description(&self) -> &str {
        "Search CRM contacts by name."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name or partial name to search for" }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let needle = params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let matches: Vec<_> = CONTACTS
            .iter()
            .filter(|c| c.name.to_ascii_lowercase().contains(&needle))
            .map(|c| json!({ "id": c.id, "name": c.name, "email": c.email, "company": c.company }))
            .collect();

        ToolResult::ok("contact_search", json!({ "contacts": matches }), started)
    }
}

pub struct CrmCreateNoteTool;

#[async_trait]
impl Tool for CrmCreateNoteTool {
    fn name(&self) -> &str {
        "crm.create_note"
    }

    fn description(&self) -> &str {
        "Attach a note to a CRM contact or deal."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "contact_id": { "type": "string" },
                "note": { "type": "string" }
            },
            "required": ["contact_id", "note"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let contact_id = params
            .get("contact_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        ToolResult::ok(
            "crm.create_note",
            json!({ "noteId": format!("note_{contact_id}_1"), "created": true }),
            started,
        )
    }
}

pub struct CrmUpdateDealTool;

#[async_trait]
impl Tool for CrmUpdateDealTool {
    fn name(&self) -> &str {
        "crm.update_deal"
    }

    fn description(&self) -> &str {
        "Update a CRM deal's stage or amount."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "deal_id": { "type": "string" },
                "stage": { "type": "string" },
                "amount": { "type": "number" }
            },
            "required": ["deal_id"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let deal_id = params
            .get("deal_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        ToolResult::ok(
            "crm.update_deal",
            json!({ "dealId": deal_id, "updated": true }),
            started,
        )
    }
}

/// Register every built-in tool against a `ToolRegistry`.
pub fn register_all(registry: &mut crate::registry::ToolRegistry, memory: Arc<dyn MemoryGateway>) {
    registry.register(Arc::new(MemorySearchTool::new(memory.clone())));
    registry.register(Arc::new(MemoryIngestTool::new(memory)));
    registry.register(Arc::new(WebSearchTool));
    registry.register(Arc::new(ContactSearchTool));
    registry.register(Arc::new(CrmCreateNoteTool));
    registry.register(Arc::new(CrmUpdateDealTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            user_id: Some("u1".into()),
        }
    }

    #[tokio::test]
    async fn contact_search_finds_peter_kelly() {
        let tool = ContactSearchTool;
        let result = tool.execute(json!({ "name": "Peter Kelly" }), &ctx()).await;
        assert!(result.success);
        let contacts = result.data.unwrap()["contacts"].as_array().unwrap().len();
        assert_eq!(contacts, 1);
    }

    #[tokio::test]
    async fn contact_search_no_match_returns_empty() {
        let tool = ContactSearchTool;
        let result = tool.execute(json!({ "name": "Nobody Here" }), &ctx()).await;
        assert!(result.success);
        assert!(result.data.unwrap()["contacts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn web_search_reports_failure() {
        let tool = WebSearchTool;
        let result = tool.execute(json!({ "query": "rust" }), &ctx()).await;
        assert!(!result.success);
    }
}

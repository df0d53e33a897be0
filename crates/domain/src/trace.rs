use serde::Serialize;

/// Structured trace events emitted across all SerialAgent crates. Each
/// variant is a named, typed snapshot of something a human debugging a
/// turn would want to grep the logs for; `emit()` logs it as a single
/// `tracing::info!` call carrying the serialized event under `trace_event`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextAssembled {
        session_id: String,
        message_count: usize,
        cross_session_snippets: usize,
        memory_snippets: usize,
        overflow_policy: &'static str,
        degraded: bool,
        estimated_tokens: usize,
    },
    SerialMemoryCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    MemoryDegraded {
        session_id: String,
        operation: &'static str,
        reason: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    RouterDecision {
        session_id: String,
        agent_id: String,
        source: String,
        confidence: Option<f32>,
    },
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    SessionLifecycleTransition {
        session_id: String,
        from_status: String,
        to_status: String,
        reason: String,
    },
    TranscriptAppend {
        session_id: String,
        message_id: String,
    },
    ToolExecuted {
        session_id: String,
        tool_name: String,
        status: String,
        duration_ms: u64,
    },
    TurnCancelled {
        session_id: String,
        stage: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}

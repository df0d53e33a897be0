//! `TurnPipeline` (§4.8): the orchestrator that turns one inbound user
//! message into a persisted assistant message and a stream of [`TurnEvent`]s.
//!
//! Grounded on the teacher's `run_turn`/`run_turn_inner` shape: a
//! `tokio::spawn`'d task per turn, an `mpsc::channel` the HTTP layer either
//! drains (SSE) or collects (non-streaming), a bounded tool loop, and a
//! `CancelToken` registered per session for the pipeline's suspension
//! points to poll between turns of the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use sa_domain::error::{Error, ErrorKind, Result};
use sa_domain::stream::{StreamEvent, Usage};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role};
use sa_domain::trace::TraceEvent;
use sa_providers::{ChatRequest, LlmProvider};
use sa_store::model::{NewToolExecution, ToolExecutionPatch, ToolExecutionStatus};
use sa_store::{MessageType, SessionPatch};
use sa_tools::ToolContext;

use crate::runtime::agent::Agent;
use crate::runtime::cancel::CancelToken;
use crate::runtime::context::AssembleRequest;
use crate::runtime::router::SessionSettings;
use crate::runtime::stream::TurnEvent;
use crate::state::AppState;

/// A turn started but not yet driven out to completion; bound every tool
/// loop from running forever when a model insists on calling tools.
const MAX_TOOL_LOOPS: usize = 25;

pub struct TurnInput {
    /// `None` starts a brand-new session.
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub user_text: String,
    /// A caller-supplied slash command already parsed out of a structured
    /// field, bypassing `Router::parse_slash` on `user_text`.
    pub explicit_slash_command: Option<String>,
}

pub struct TurnHandle {
    pub session_id: String,
    pub rx: mpsc::Receiver<TurnEvent>,
}

/// Starts a turn: acquires the session lock, spawns the driving task, and
/// returns immediately with the session id and an event receiver. The
/// `mpsc` channel's sender is owned entirely by the spawned task; dropping
/// the receiver (client disconnect) does not stop the task outright — that
/// is what `CancelMap` is for — but it does stop new events accumulating
/// unread.
pub async fn start_turn(
    state: Arc<AppState>,
    input: TurnInput,
) -> std::result::Result<TurnHandle, Error> {
    let session_id = match &input.session_id {
        Some(id) => id.clone(),
        None => Uuid::new_v4().simple().to_string(),
    };
    let is_new = state.store.get_session(&session_id).await?.is_none();
    if is_new {
        state
            .store
            .create_session(&session_id, input.user_id.as_deref(), None)
            .await?;
    }
    TraceEvent::SessionResolved {
        session_id: session_id.clone(),
        is_new,
    }
    .emit();

    if !state.session_rate_limiter.check(&session_id) {
        return Err(Error::RateLimited(format!(
            "session {session_id} is issuing turns too quickly"
        )));
    }

    let permit = state
        .sessions
        .acquire(&session_id)
        .await
        .map_err(|_| Error::Other("session busy".into()))?;

    let (tx, rx) = mpsc::channel(64);
    let cancel = state.cancels.register(&session_id);
    let sid = session_id.clone();

    tokio::spawn(async move {
        let _permit = permit; // held for the whole turn, released on drop
        if let Err(e) = run_turn(state.clone(), sid.clone(), input, tx.clone(), cancel.clone()).await {
            let _ = tx
                .send(TurnEvent::Error {
                    message: e.to_string(),
                    kind: kind_name(e.kind()),
                })
                .await;
        }
        state.cancels.remove(&sid);
        state
            .sessions
            .schedule_inactivity_transition(&sid, state.config.sessions.lifecycle.idle_minutes as u64 * 60_000);
    });

    Ok(TurnHandle { session_id, rx })
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Auth => "auth",
        ErrorKind::NotFound => "notFound",
        ErrorKind::RateLimited => "rateLimited",
        ErrorKind::Timeout => "timeout",
        ErrorKind::Tool => "tool",
        ErrorKind::Upstream => "upstream",
        ErrorKind::Storage => "storage",
        ErrorKind::Degraded => "degraded",
        ErrorKind::Cancelled => "cancelled",
    }
}

async fn run_turn(
    state: Arc<AppState>,
    session_id: String,
    input: TurnInput,
    tx: mpsc::Sender<TurnEvent>,
    cancel: CancelToken,
) -> Result<()> {
    // Step 0: quota pre-flight, before anything else spends work on this
    // turn — matches the teacher's prepare_turn_context ordering.
    state
        .quota
        .check_quota(None)
        .map_err(|e| Error::RateLimited(format!("daily {} quota exceeded ({} >= {})", e.kind, e.used, e.limit)))?;

    // Step 1: persist the inbound user message.
    let user_msg = state
        .store
        .append_message(&session_id, MessageType::User, &input.user_text, Default::default())
        .await?;
    TraceEvent::TranscriptAppend {
        session_id: session_id.clone(),
        message_id: user_msg.id.to_string(),
    }
    .emit();

    // Step 2: load session settings (agent lock / preference) from metadata.
    let session = state
        .store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
    let settings = session_settings_from_metadata(&session.metadata);

    // Step 3: route.
    let decision = state.router.decide(
        &session_id,
        &input.user_text,
        &settings,
        input.explicit_slash_command.as_deref(),
    );
    let agent = state
        .agents
        .get(&decision.agent)
        .cloned()
        .ok_or_else(|| Error::Validation(format!("unknown agent '{}'", decision.agent)))?;

    state
        .quota
        .check_quota(Some(&agent.id))
        .map_err(|e| Error::RateLimited(format!("agent '{}' daily {} quota exceeded", agent.id, e.kind)))?;

    // Remember the resolved agent for next turn's `Lock` precedence, without
    // touching the rest of the session's metadata.
    let mut last_agent_meta = std::collections::HashMap::new();
    last_agent_meta.insert("lastAgent".to_string(), json!(agent.id));
    state
        .store
        .update_session(
            &session_id,
            SessionPatch {
                metadata: Some(last_agent_meta),
                ..Default::default()
            },
        )
        .await?;

    // Step 4: assemble context.
    let bundle = state
        .context
        .assemble(AssembleRequest {
            session_id: &session_id,
            user_id: input.user_id.as_deref(),
            current_user_text: &input.user_text,
            system_prompt: &agent.system_prompt,
            max_messages: None,
            current_message_id: Some(user_msg.id),
        })
        .await?;

    tx.send(TurnEvent::Start {
        session_id: session_id.clone(),
        agent: agent.id.clone(),
    })
    .await
    .ok();

    if agent.is_agency() {
        tx.send(TurnEvent::Status { stage: "intake".into() }).await.ok();
    }

    // Step 5: resolve the provider for this agent/model.
    let provider = resolve_provider(&state, agent.model.as_deref())?;

    let tool_ctx = ToolContext {
        session_id: session_id.clone(),
        user_id: input.user_id.clone(),
    };

    // Step 6: drive the agent FSM (planning / tool_call / tool_wait / generating).
    let outcome = drive_agent(
        &state,
        &agent,
        provider,
        bundle.messages.clone(),
        &tx,
        &cancel,
        &tool_ctx,
    )
    .await;

    let cancelled = cancel.is_cancelled();
    let (content, tools_used, usage, turn_error) = match outcome {
        Ok((content, tools_used, usage)) => (content, tools_used, usage, None),
        Err(e) => (String::new(), Vec::new(), None, Some(e)),
    };

    // Step 7: record usage against the quota tracker.
    if let Some(u) = &usage {
        let cost = estimate_cost(&state, agent.model.as_deref(), u);
        state.quota.record_usage(Some(&agent.id), u.total_tokens as u64, cost);
    }

    // Step 8: best-effort memory write of this turn.
    let memory_status = if !content.is_empty() {
        state
            .memory
            .add_turn(
                &session_id,
                input.user_id.as_deref().unwrap_or(""),
                &[
                    sa_memory::TurnMessage {
                        role: "user",
                        content: input.user_text.clone(),
                    },
                    sa_memory::TurnMessage {
                        role: "assistant",
                        content: content.clone(),
                    },
                ],
            )
            .await
    } else {
        sa_memory::MemoryGateway::add_turn(state.memory.as_ref(), &session_id, "", &[]).await
    };

    let degraded = bundle.degraded || memory_status.status == "degraded";
    let mut metadata = json!({
        "agent": agent.id,
        "routerDecision": {
            "agent": decision.agent,
            "confidence": decision.confidence,
            "reason": decision.reason,
            "overrideSource": decision.override_source,
        },
        "toolsUsed": tools_used,
        "memory": { "status": memory_status.status, "reason": memory_status.reason },
        "degraded": degraded,
    });
    if let Some(obj) = metadata.as_object_mut() {
        if cancelled {
            obj.insert("status".into(), json!("cancelled"));
        }
        if let Some(e) = &turn_error {
            obj.insert("error".into(), json!(e.to_string()));
        }
    }

    // Step 9: persist the assistant message, even on partial/cancelled/error.
    state
        .store
        .append_message(&session_id, MessageType::Assistant, &content, json_to_map(metadata.clone()))
        .await?;

    if cancelled {
        TraceEvent::TurnCancelled {
            session_id: session_id.clone(),
            stage: "generating".into(),
        }
        .emit();
    }

    // Step 10: close the stream.
    if let Some(e) = turn_error {
        tx.send(TurnEvent::Error {
            message: e.to_string(),
            kind: kind_name(e.kind()),
        })
        .await
        .ok();
        return Err(e);
    }
    tx.send(TurnEvent::End { content, metadata }).await.ok();
    Ok(())
}

fn json_to_map(v: Value) -> std::collections::HashMap<String, Value> {
    match v {
        Value::Object(m) => m.into_iter().collect(),
        _ => Default::default(),
    }
}

fn session_settings_from_metadata(metadata: &std::collections::HashMap<String, Value>) -> SessionSettings {
    SessionSettings {
        agent_lock: metadata.get("agentLock").and_then(|v| v.as_bool()).unwrap_or(false),
        last_agent: metadata.get("lastAgent").and_then(|v| v.as_str()).map(str::to_string),
        agent_preference: metadata
            .get("agentPreference")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}

fn resolve_provider(
    state: &AppState,
    model_override: Option<&str>,
) -> Result<Arc<dyn sa_providers::LlmProvider>> {
    if let Some(spec) = model_override {
        if let Some((provider_id, _model)) = spec.split_once('/') {
            if let Some(p) = state.providers.get(provider_id) {
                return Ok(p);
            }
        }
    }
    state
        .providers
        .default_provider()
        .ok_or_else(|| Error::Provider {
            provider: "none".into(),
            message: "no LLM provider configured".into(),
        })
}

fn estimate_cost(state: &AppState, model: Option<&str>, usage: &Usage) -> f64 {
    let Some(model) = model else { return 0.0 };
    let Some(pricing) = state.config.llm.pricing.get(model) else {
        return 0.0;
    };
    pricing.estimate_cost(usage.prompt_tokens, usage.completion_tokens)
}

/// Drives the provider/tool loop to completion: each outer iteration is one
/// `planning` -> (maybe `tool_call`/`tool_wait`) -> `generating` round-trip.
/// Returns the final assistant text, the tool names invoked, and the final
/// usage snapshot, if any.
async fn drive_agent(
    state: &Arc<AppState>,
    agent: &Agent,
    provider: Arc<dyn sa_providers::LlmProvider>,
    mut messages: Vec<Message>,
    tx: &mpsc::Sender<TurnEvent>,
    cancel: &CancelToken,
    tool_ctx: &ToolContext,
) -> Result<(String, Vec<String>, Option<Usage>)> {
    let tool_defs = agent.allowed_tools(&state.tools);
    let mut tools_used = Vec::new();
    let mut last_usage = None;

    for _ in 0..MAX_TOOL_LOOPS {
        if cancel.is_cancelled() {
            break;
        }

        let req = ChatRequest {
            messages: messages.clone(),
            tools: tool_defs.clone(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
            model: agent.model.clone(),
        };

        let started = Instant::now();
        let mut stream = provider.chat_stream(&req).await?;

        let mut text_buf = String::new();
        let mut pending_calls: Vec<(String, String, String)> = Vec::new(); // (call_id, tool_name, arg_json_fragment)
        let mut finish_reason = None;
        let mut usage = None;

        while let Some(event) = stream.next().await {
            let event = event?;
            match event {
                StreamEvent::Token { text } => {
                    text_buf.push_str(&text);
                    if !cancel.is_cancelled() {
                        tx.send(TurnEvent::Token { text }).await.ok();
                    }
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    pending_calls.push((call_id, tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some(c) = pending_calls.iter_mut().find(|(id, ..)| *id == call_id) {
                        c.2.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    if let Some(c) = pending_calls.iter_mut().find(|(id, ..)| *id == call_id) {
                        c.1 = tool_name;
                        c.2 = arguments.to_string();
                    } else {
                        pending_calls.push((call_id, tool_name, arguments.to_string()));
                    }
                }
                StreamEvent::Done { usage: u, finish_reason: fr } => {
                    usage = u;
                    finish_reason = fr;
                }
                StreamEvent::Error { message } => {
                    return Err(Error::Provider {
                        provider: provider.provider_id().to_string(),
                        message,
                    });
                }
            }
        }

        TraceEvent::LlmRequest {
            provider: provider.provider_id().to_string(),
            model: agent.model.clone().unwrap_or_default(),
            role: "executor".into(),
            streaming: true,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();
        last_usage = usage.or(last_usage);

        let wants_tools = finish_reason.as_deref() == Some("tool_calls") && !pending_calls.is_empty();
        if !wants_tools || cancel.is_cancelled() {
            return Ok((text_buf, tools_used, last_usage));
        }

        // planning -> tool_call -> tool_wait: run every pending call in turn,
        // persisting a `ToolExecution` row per invocation.
        let mut tool_use_parts = Vec::with_capacity(pending_calls.len());
        let mut tool_result_msgs = Vec::with_capacity(pending_calls.len());
        for (call_id, tool_name, args_json) in &pending_calls {
            if cancel.is_cancelled() {
                // finish already-started calls, stop issuing new ones
                break;
            }
            let args: Value = serde_json::from_str(args_json).unwrap_or(Value::Object(Default::default()));
            tool_use_parts.push(ContentPart::ToolUse {
                id: call_id.clone(),
                name: tool_name.clone(),
                input: args.clone(),
            });

            if !agent.tool_policy.allows(tool_name) {
                let msg = format!("agent '{}' is not permitted to call '{tool_name}'", agent.id);
                tx.send(TurnEvent::ToolResult {
                    tool_call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                    success: false,
                    data: None,
                    error: Some(msg.clone()),
                    duration_ms: 0,
                })
                .await
                .ok();
                tool_result_msgs.push(Message::tool_result(call_id.clone(), msg));
                continue;
            }

            tx.send(TurnEvent::ToolStart {
                tool_call_id: call_id.clone(),
                tool_name: tool_name.clone(),
            })
            .await
            .ok();

            let exec_id = state
                .store
                .log_tool_execution(NewToolExecution {
                    session_id: tool_ctx.session_id.clone(),
                    message_id: None,
                    tool_name: tool_name.clone(),
                    tool_input: args.clone(),
                    metadata: Default::default(),
                })
                .await?;

            let tool_started = Instant::now();
            let timeout = Duration::from_millis(state.config.tools.default_timeout_ms);
            let outcome = tokio::time::timeout(timeout, state.tools.invoke(tool_name, args, tool_ctx)).await;

            let (patch, sent_result) = match outcome {
                Ok(Ok(result)) => {
                    let status = if result.success {
                        ToolExecutionStatus::Success
                    } else {
                        ToolExecutionStatus::Error
                    };
                    let output = cap_output(result.data.clone(), state.config.tools.output_cap_bytes);
                    let duration_ms = tool_started.elapsed().as_millis() as u64;
                    (
                        ToolExecutionPatch {
                            status,
                            tool_output: output.clone(),
                            error_message: result.error.clone(),
                            duration_ms: Some(duration_ms as i64),
                            message_id: None,
                        },
                        TurnEvent::ToolResult {
                            tool_call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                            success: result.success,
                            data: output,
                            error: result.error.clone(),
                            duration_ms,
                        },
                    )
                }
                Ok(Err(e)) => {
                    let duration_ms = tool_started.elapsed().as_millis() as u64;
                    (
                        ToolExecutionPatch {
                            status: ToolExecutionStatus::Error,
                            tool_output: None,
                            error_message: Some(e.to_string()),
                            duration_ms: Some(duration_ms as i64),
                            message_id: None,
                        },
                        TurnEvent::ToolResult {
                            tool_call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                            success: false,
                            data: None,
                            error: Some(e.to_string()),
                            duration_ms,
                        },
                    )
                }
                Err(_) => {
                    let duration_ms = tool_started.elapsed().as_millis() as u64;
                    (
                        ToolExecutionPatch {
                            status: ToolExecutionStatus::Error,
                            tool_output: None,
                            error_message: Some("timed out".into()),
                            duration_ms: Some(duration_ms as i64),
                            message_id: None,
                        },
                        TurnEvent::ToolResult {
                            tool_call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                            success: false,
                            data: None,
                            error: Some("timed out".into()),
                            duration_ms,
                        },
                    )
                }
            };

            state.store.update_tool_execution(exec_id, patch.clone()).await?;
            TraceEvent::ToolExecuted {
                session_id: tool_ctx.session_id.clone(),
                tool_name: tool_name.clone(),
                status: patch.status.as_str().to_string(),
                duration_ms: patch.duration_ms.unwrap_or(0) as u64,
            }
            .emit();

            let result_text = patch
                .tool_output
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| patch.error_message.clone().unwrap_or_default());
            tool_result_msgs.push(Message::tool_result(call_id.clone(), result_text));
            tools_used.push(tool_name.clone());
            tx.send(sent_result).await.ok();
        }

        if !tool_use_parts.is_empty() {
            messages.push(Message {
                role: Role::Assistant,
                content: MessageContent::Parts(tool_use_parts),
            });
        }
        messages.extend(tool_result_msgs);
    }

    Ok((
        "reached the maximum number of tool calls for this turn".to_string(),
        tools_used,
        last_usage,
    ))
}

fn cap_output(data: Option<Value>, cap_bytes: usize) -> Option<Value> {
    let data = data?;
    let rendered = data.to_string();
    if rendered.len() <= cap_bytes {
        return Some(data);
    }
    let truncated: String = rendered.chars().take(cap_bytes).collect();
    Some(json!({ "truncated": true, "preview": truncated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_output_passes_small_values_through() {
        let v = json!({ "ok": true });
        assert_eq!(cap_output(Some(v.clone()), 1024), Some(v));
    }

    #[test]
    fn cap_output_truncates_large_values() {
        let big = json!({ "text": "x".repeat(100) });
        let capped = cap_output(Some(big), 16).unwrap();
        assert_eq!(capped["truncated"], json!(true));
    }
}

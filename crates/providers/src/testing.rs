//! A scripted [`LlmProvider`] double for exercising the turn pipeline
//! without a network call. There is no teacher precedent for a provider
//! test-double (the teacher's adapters are tested against recorded HTTP
//! fixtures instead) — this is built fresh against the `LlmProvider` seam,
//! shaped the way the adapters in this crate already produce `StreamEvent`s.
//!
//! Each call to [`MockProvider::chat_stream`] pops the next scripted
//! sequence of events off an internal queue (cloned, not consumed, once the
//! queue runs dry) and replays it as a stream, so a test can script an
//! agent's full tool-loop: a first call that emits a tool call, a second
//! that emits the final text.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::Notify;

use sa_domain::capability::{LlmCapabilities, ToolSupport};
use sa_domain::error::Result;
use sa_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
use crate::traits::LlmProvider;

/// One scripted turn of a mock conversation: the events `chat_stream`
/// replays, in order.
pub type ScriptedTurn = Vec<StreamEvent>;

pub struct MockProvider {
    id: String,
    capabilities: LlmCapabilities,
    turns: Mutex<Vec<ScriptedTurn>>,
    /// Every request this provider has seen, for assertions about what the
    /// pipeline sent upstream (tool definitions offered, message history).
    pub requests: Mutex<Vec<ChatRequest>>,
    /// When set, the very first `chat_stream` call yields its first event,
    /// then waits on this before yielding the rest — a deterministic window
    /// for a test to flip cancellation between the two.
    first_call_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockProvider {
    /// A provider that always answers with a single text token then `done`.
    pub fn fixed_reply(id: &str, text: &str) -> Self {
        Self::scripted(
            id,
            vec![vec![
                StreamEvent::Token { text: text.to_string() },
                StreamEvent::Done {
                    usage: Some(Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    }),
                    finish_reason: Some("stop".to_string()),
                },
            ]],
        )
    }

    /// A provider that replays `turns` in order, one per `chat_stream` call,
    /// then repeats the final turn for any call beyond the script's length.
    pub fn scripted(id: &str, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            id: id.to_string(),
            capabilities: LlmCapabilities {
                supports_tools: ToolSupport::Basic,
                supports_streaming: true,
                supports_json_mode: false,
                supports_vision: false,
                context_window_tokens: Some(128_000),
                max_output_tokens: Some(4_096),
            },
            turns: Mutex::new(turns),
            requests: Mutex::new(Vec::new()),
            first_call_gate: Mutex::new(None),
        }
    }

    /// Like [`Self::tool_then_reply`], but the first call's stream pauses
    /// after its first event until `gate` is notified — lets a test observe
    /// that event arrive over the turn's channel, flip cancellation, then
    /// release the rest of the round.
    pub fn tool_then_reply_gated(
        id: &str,
        call_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
        final_text: &str,
        gate: Arc<Notify>,
    ) -> Self {
        let provider = Self::tool_then_reply(id, call_id, tool_name, arguments, final_text);
        *provider.first_call_gate.lock().unwrap() = Some(gate);
        provider
    }

    /// A provider whose first call emits a single tool call (`tool_name`
    /// with `arguments`) and whose second call answers with `final_text`.
    /// Matches the two-round shape scenario #2 needs: plan a `crm` lookup,
    /// then summarize its result.
    pub fn tool_then_reply(
        id: &str,
        call_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
        final_text: &str,
    ) -> Self {
        Self::scripted(
            id,
            vec![
                vec![
                    StreamEvent::ToolCallStarted {
                        call_id: call_id.to_string(),
                        tool_name: tool_name.to_string(),
                    },
                    StreamEvent::ToolCallFinished {
                        call_id: call_id.to_string(),
                        tool_name: tool_name.to_string(),
                        arguments,
                    },
                    StreamEvent::Done {
                        usage: None,
                        finish_reason: Some("tool_calls".to_string()),
                    },
                ],
                vec![
                    StreamEvent::Token { text: final_text.to_string() },
                    StreamEvent::Done {
                        usage: Some(Usage {
                            prompt_tokens: 20,
                            completion_tokens: 8,
                            total_tokens: 28,
                        }),
                        finish_reason: Some("stop".to_string()),
                    },
                ],
            ],
        )
    }

    fn next_turn(&self) -> ScriptedTurn {
        let mut turns = self.turns.lock().unwrap();
        if turns.len() > 1 {
            turns.remove(0)
        } else {
            turns.last().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(req.clone());
        let turn = self.next_turn();
        let mut content = String::new();
        for event in &turn {
            if let StreamEvent::Token { text } = event {
                content.push_str(text);
            }
        }
        Ok(ChatResponse {
            content,
            tool_calls: Vec::new(),
            usage: None,
            model: self.id.clone(),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let is_first_call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(req.clone());
            requests.len() == 1
        };
        let turn = self.next_turn();

        let gate = if is_first_call {
            self.first_call_gate.lock().unwrap().take()
        } else {
            None
        };

        if let Some(gate) = gate {
            let stream = async_stream::stream! {
                let mut events = turn.into_iter();
                if let Some(first) = events.next() {
                    yield Ok(first);
                }
                gate.notified().await;
                for event in events {
                    yield Ok(event);
                }
            };
            return Ok(Box::pin(stream));
        }

        Ok(Box::pin(stream::iter(turn.into_iter().map(Ok))))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Ok(EmbeddingsResponse {
            embeddings: req.input.iter().map(|_| vec![0.0_f32; 8]).collect(),
        })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_reply_streams_one_token_then_done() {
        let provider = MockProvider::fixed_reply("mock", "hello");
        let mut stream = provider
            .chat_stream(&ChatRequest::default())
            .await
            .unwrap();
        let mut events = Vec::new();
        while let Some(e) = futures_util::StreamExt::next(&mut stream).await {
            events.push(e.unwrap());
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Token { text } if text == "hello"));
        assert!(matches!(&events[1], StreamEvent::Done { .. }));
    }

    #[tokio::test]
    async fn tool_then_reply_advances_across_calls() {
        let provider = MockProvider::tool_then_reply(
            "mock",
            "call1",
            "contact_search",
            serde_json::json!({"query": "Peter Kelly"}),
            "found the contact",
        );
        let mut first = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let mut first_events = Vec::new();
        while let Some(e) = futures_util::StreamExt::next(&mut first).await {
            first_events.push(e.unwrap());
        }
        assert!(matches!(&first_events[0], StreamEvent::ToolCallStarted { tool_name, .. } if tool_name == "contact_search"));

        let mut second = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let mut second_events = Vec::new();
        while let Some(e) = futures_util::StreamExt::next(&mut second).await {
            second_events.push(e.unwrap());
        }
        assert!(matches!(&second_events[0], StreamEvent::Token { text } if text == "found the contact"));
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gated_stream_pauses_after_first_event_until_notified() {
        let gate = Arc::new(Notify::new());
        let provider = MockProvider::tool_then_reply_gated(
            "mock",
            "call1",
            "contact_search",
            serde_json::json!({"query": "Peter"}),
            "found the contact",
            gate.clone(),
        );

        let mut stream = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let first = futures_util::StreamExt::next(&mut stream).await.unwrap().unwrap();
        assert!(matches!(first, StreamEvent::ToolCallStarted { .. }));

        // The stream must not produce anything further until notified.
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            futures_util::StreamExt::next(&mut stream),
        )
        .await;
        assert!(pending.is_err(), "stream yielded before the gate was notified");

        gate.notify_one();
        let rest: Vec<_> = futures_util::StreamExt::collect::<Vec<_>>(stream).await;
        assert_eq!(rest.len(), 2);
    }
}

//! Context assembly (§4.5): turns a session id and the current user text
//! into the ordered message list a provider call actually sees.
//!
//! Assembly order is fixed: system prompt, cross-session snippets, memory
//! snippets, recent session history, current user message last. Overflow
//! trimming never drops the current user message — see `fit_to_budget`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sa_domain::config::{ContextConfig, OverflowPolicy};
use sa_domain::tool::{Message, Role};
use sa_domain::trace::TraceEvent;
use sa_memory::MemoryGateway;
use sa_store::{ListSessionsQuery, MessageType, PersistentStore, SessionStatus, SortOrder};

/// The assembled, ready-to-send message list plus bookkeeping the caller
/// persists onto the assistant message's metadata.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub messages: Vec<Message>,
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    pub estimated_tokens: usize,
    pub cross_session_snippet_count: usize,
    pub memory_snippet_count: usize,
}

pub struct AssembleRequest<'a> {
    pub session_id: &'a str,
    /// `None` disables cross-session lookup entirely, regardless of policy
    /// — assembling cross-session context without a user id would leak
    /// another user's history into this session (§9).
    pub user_id: Option<&'a str>,
    pub current_user_text: &'a str,
    pub system_prompt: &'a str,
    /// Overrides `ContextConfig.max_messages` for this turn when set.
    pub max_messages: Option<usize>,
    /// The id `appendMessage` returned for the current user turn, already
    /// persisted by the pipeline before `assemble` runs. Recent-history
    /// reads exclude this row — `current_user_text` is appended separately
    /// as the bundle's last message, so leaving it in would duplicate it.
    pub current_message_id: Option<i64>,
}

pub struct ContextAssembler {
    store: Arc<PersistentStore>,
    memory: Arc<dyn MemoryGateway>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(store: Arc<PersistentStore>, memory: Arc<dyn MemoryGateway>, config: ContextConfig) -> Self {
        Self {
            store,
            memory,
            config,
        }
    }

    pub async fn assemble(&self, req: AssembleRequest<'_>) -> sa_domain::error::Result<ContextBundle> {
        let max_messages = req.max_messages.unwrap_or(self.config.max_messages).max(1);

        let system_msg = Message::system(req.system_prompt.to_string());
        let current_msg = Message::user(req.current_user_text.to_string());

        let cross_session_msgs = self.cross_session_snippets(req.session_id, req.user_id).await?;
        let (memory_msgs, mut degraded, mut degraded_reason) = self
            .memory_snippets(req.session_id, req.user_id, req.current_user_text)
            .await;

        let recent_msgs = self
            .store
            .read_last_messages(req.session_id, max_messages as i64)
            .await?
            .into_iter()
            .filter(|m| Some(m.id) != req.current_message_id)
            .map(store_message_to_domain)
            .collect::<Vec<_>>();

        let cross_session_count = cross_session_msgs.len();
        let memory_count = memory_msgs.len();

        let mut rest: Vec<Message> = Vec::with_capacity(
            cross_session_msgs.len() + memory_msgs.len() + recent_msgs.len() + 1,
        );
        rest.extend(cross_session_msgs);
        rest.extend(memory_msgs);
        rest.extend(recent_msgs);
        rest.push(current_msg);

        let overflowed = 1 + rest.len() > max_messages;
        let mut messages = self.fit_to_budget(system_msg, rest, max_messages);

        if overflowed && self.config.overflow_policy == OverflowPolicy::Summarize {
            // No summarizer is wired up; fall back to sliding-window
            // behavior (already applied above) and flag the bundle.
            degraded = true;
            degraded_reason.get_or_insert_with(|| "summarize policy has no backing summarizer; fell back to sliding-window".into());
        }

        let estimated_tokens: usize = messages.iter().map(estimate_tokens).sum();

        TraceEvent::ContextAssembled {
            session_id: req.session_id.to_string(),
            message_count: messages.len(),
            cross_session_snippets: cross_session_count,
            memory_snippets: memory_count,
            overflow_policy: overflow_policy_name(self.config.overflow_policy),
            degraded,
            estimated_tokens,
        }
        .emit();

        // Invariant: the current user message is never silently dropped.
        debug_assert!(messages
            .last()
            .map(|m| matches!(m.content.text(), Some(t) if t == req.current_user_text))
            .unwrap_or(false));

        messages.shrink_to_fit();
        Ok(ContextBundle {
            messages,
            degraded,
            degraded_reason,
            estimated_tokens,
            cross_session_snippet_count: cross_session_count,
            memory_snippet_count: memory_count,
        })
    }

    /// Standalone ranked cross-session lookup for `POST
    /// /api/memory/cross-session`: the same session scan `assemble` uses
    /// internally, exposed directly so a client can preview what would be
    /// pulled into context without running a turn. Ordered most-recent
    /// session first, same leak-prevention rule (`user_id` required).
    pub async fn query_cross_session(
        &self,
        session_id: &str,
        user_id: &str,
        limit: usize,
    ) -> sa_domain::error::Result<Vec<Message>> {
        let mut msgs = self.cross_session_snippets(session_id, Some(user_id)).await?;
        if msgs.len() > limit {
            msgs.truncate(limit);
        }
        Ok(msgs)
    }

    /// Apply the configured overflow policy. `rest` is everything after
    /// the system prompt, in final order, ending with the current user
    /// message.
    fn fit_to_budget(&self, system_msg: Message, rest: Vec<Message>, max_messages: usize) -> Vec<Message> {
        match self.config.overflow_policy {
            OverflowPolicy::Truncate => {
                let mut combined = Vec::with_capacity(1 + rest.len());
                combined.push(system_msg);
                combined.extend(rest);
                let total = combined.len();
                if total > max_messages {
                    combined.split_off(total - max_messages)
                } else {
                    combined
                }
            }
            // Summarize has no backing implementation; treated identically
            // to SlidingWindow here (the caller flags `degraded`).
            OverflowPolicy::SlidingWindow | OverflowPolicy::Summarize => {
                let reserved_system = self.config.system_reserved_slots.min(max_messages.saturating_sub(1));
                let budget_rest = (max_messages - reserved_system).max(1);
                let keep_from = rest.len().saturating_sub(budget_rest);
                let mut out = Vec::with_capacity(reserved_system + budget_rest);
                if reserved_system > 0 {
                    out.push(system_msg);
                }
                out.extend_from_slice(&rest[keep_from..]);
                out
            }
        }
    }

    /// Pulls recent messages from the user's other active sessions.
    /// Returns empty when cross-session lookup is disabled or `user_id`
    /// is absent — see the leak-prevention note on `AssembleRequest`.
    async fn cross_session_snippets(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> sa_domain::error::Result<Vec<Message>> {
        let policy = &self.config.cross_session;
        let Some(user_id) = user_id.filter(|_| policy.enabled) else {
            return Ok(Vec::new());
        };

        let sessions = self
            .store
            .list_sessions(ListSessionsQuery {
                status: Some(SessionStatus::Active),
                user_id: Some(user_id.to_string()),
                sort_by: Some("last_activity_at".into()),
                sort_order: Some(SortOrder::Desc),
                limit: Some((policy.max_sessions * 4) as i64),
                offset: None,
            })
            .await?;

        let cutoff = Utc::now() - Duration::hours(policy.window_hours);
        let mut out = Vec::new();
        for session in sessions
            .into_iter()
            .filter(|s| s.id != session_id && s.last_activity_at >= cutoff)
            .take(policy.max_sessions)
        {
            let msgs = self
                .store
                .read_last_messages(&session.id, policy.max_messages_per_session as i64)
                .await?;
            out.extend(msgs.into_iter().map(|m| {
                Message::system(format!(
                    "[cross-session {}] {}: {}",
                    session.id,
                    m.kind.as_str(),
                    m.content
                ))
            }));
        }
        Ok(out)
    }

    /// Best-effort long-term-memory lookup. Timeouts/errors degrade rather
    /// than fail the turn — see `MemoryGateway::query_relevant`.
    async fn memory_snippets(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        query: &str,
    ) -> (Vec<Message>, bool, Option<String>) {
        if !self.config.memory.enabled {
            return (Vec::new(), false, None);
        }
        let (snippets, status) = self
            .memory
            .query_relevant(session_id, user_id.unwrap_or(""), query, self.config.memory.max_snippets)
            .await;

        let degraded = status.status == "degraded";
        let reason = status.reason;
        let msgs = snippets
            .into_iter()
            .map(|s| Message::system(format!("[memory] {}", s.content)))
            .collect();
        (msgs, degraded, reason)
    }
}

fn store_message_to_domain(m: sa_store::Message) -> Message {
    let role = match m.kind {
        MessageType::User => Role::User,
        MessageType::Assistant => Role::Assistant,
        MessageType::System => Role::System,
    };
    Message {
        role,
        content: sa_domain::tool::MessageContent::Text(m.content),
    }
}

fn estimate_tokens(m: &Message) -> usize {
    let len = m.content.extract_all_text().len();
    len.div_ceil(4) + 4
}

fn overflow_policy_name(p: OverflowPolicy) -> &'static str {
    match p {
        OverflowPolicy::SlidingWindow => "sliding-window",
        OverflowPolicy::Truncate => "truncate",
        OverflowPolicy::Summarize => "summarize",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::StoreConfig;
    use sa_memory::NullMemoryGateway;

    async fn assembler() -> (ContextAssembler, Arc<PersistentStore>) {
        let store = Arc::new(
            PersistentStore::connect(&StoreConfig {
                sqlite_path: ":memory:".into(),
                ..StoreConfig::default()
            })
            .await
            .unwrap(),
        );
        let memory = Arc::new(NullMemoryGateway);
        let assembler = ContextAssembler::new(store.clone(), memory, ContextConfig::default());
        (assembler, store)
    }

    #[tokio::test]
    async fn fresh_session_yields_system_and_current_user_only() {
        let (assembler, store) = assembler().await;
        store.create_session("s1", None, None).await.unwrap();

        let bundle = assembler
            .assemble(AssembleRequest {
                session_id: "s1",
                user_id: None,
                current_user_text: "hello",
                system_prompt: "be helpful",
                max_messages: None,
                current_message_id: None,
            })
            .await
            .unwrap();

        assert_eq!(bundle.messages.len(), 2);
        assert_eq!(bundle.messages[0].role, Role::System);
        assert_eq!(bundle.messages[1].role, Role::User);
        assert!(!bundle.degraded);
    }

    #[tokio::test]
    async fn current_user_message_survives_tight_budget() {
        let (assembler, store) = assembler().await;
        store.create_session("s1", None, None).await.unwrap();
        for i in 0..10 {
            store
                .append_message(
                    "s1",
                    MessageType::User,
                    &format!("msg {i}"),
                    Default::default(),
                )
                .await
                .unwrap();
        }

        let bundle = assembler
            .assemble(AssembleRequest {
                session_id: "s1",
                user_id: None,
                current_user_text: "the latest question",
                system_prompt: "be helpful",
                max_messages: Some(1),
                current_message_id: None,
            })
            .await
            .unwrap();

        assert_eq!(bundle.messages.len(), 1);
        assert_eq!(
            bundle.messages[0].content.text(),
            Some("the latest question")
        );
    }

    #[tokio::test]
    async fn current_message_id_excludes_the_just_persisted_row_from_recent_history() {
        let (assembler, store) = assembler().await;
        store.create_session("s1", None, None).await.unwrap();
        store
            .append_message("s1", MessageType::User, "older turn", Default::default())
            .await
            .unwrap();
        // Mirrors the pipeline: the current user message is persisted
        // before `assemble` runs, so `read_last_messages` would otherwise
        // pick it up as "recent history" on top of it being appended again
        // as the current message.
        let current = store
            .append_message("s1", MessageType::User, "hello", Default::default())
            .await
            .unwrap();

        let bundle = assembler
            .assemble(AssembleRequest {
                session_id: "s1",
                user_id: None,
                current_user_text: "hello",
                system_prompt: "be helpful",
                max_messages: None,
                current_message_id: Some(current.id),
            })
            .await
            .unwrap();

        let occurrences = bundle
            .messages
            .iter()
            .filter(|m| m.content.text() == Some("hello"))
            .count();
        assert_eq!(occurrences, 1, "the current user turn must appear exactly once");
        assert_eq!(bundle.messages.last().unwrap().content.text(), Some("hello"));
    }

    #[tokio::test]
    async fn without_user_id_cross_session_is_skipped() {
        let (assembler, store) = assembler().await;
        store.create_session("other", Some("u1"), None).await.unwrap();
        store
            .append_message("other", MessageType::User, "secret from another session", Default::default())
            .await
            .unwrap();
        store.create_session("s1", None, None).await.unwrap();

        let bundle = assembler
            .assemble(AssembleRequest {
                session_id: "s1",
                user_id: None,
                current_user_text: "hi",
                system_prompt: "be helpful",
                max_messages: None,
                current_message_id: None,
            })
            .await
            .unwrap();

        assert!(bundle
            .messages
            .iter()
            .all(|m| !m.content.extract_all_text().contains("secret from another session")));
    }

    #[tokio::test]
    async fn truncate_policy_keeps_last_n_no_system_guarantee() {
        let (assembler, store) = assembler().await;
        let mut config = ContextConfig::default();
        config.overflow_policy = OverflowPolicy::Truncate;
        let assembler = ContextAssembler::new(store.clone(), Arc::new(NullMemoryGateway), config);
        store.create_session("s1", None, None).await.unwrap();
        for i in 0..250 {
            store
                .append_message("s1", MessageType::User, &format!("m{i}"), Default::default())
                .await
                .unwrap();
        }

        let bundle = assembler
            .assemble(AssembleRequest {
                session_id: "s1",
                user_id: None,
                current_user_text: "final question",
                system_prompt: "be helpful",
                max_messages: Some(100),
                current_message_id: None,
            })
            .await
            .unwrap();

        assert_eq!(bundle.messages.len(), 100);
        assert_eq!(bundle.messages.last().unwrap().content.text(), Some("final question"));
    }
}

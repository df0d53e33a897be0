use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use sa_domain::config::StoreConfig;
use sa_domain::error::{Error, Result};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::storage_err;
use crate::model::*;

/// Durable storage for sessions, messages, and tool executions. No
/// business logic lives here — ordering and counters are store-level
/// invariants, everything else (locking, routing, context) is a caller
/// concern.
#[derive(Clone)]
pub struct PersistentStore {
    pool: SqlitePool,
}

impl PersistentStore {
    /// Connect (creating the file if missing) and, if `auto_migrate`,
    /// apply embedded migrations.
    pub async fn connect(cfg: &StoreConfig) -> Result<Self> {
        let target = if cfg.sqlite_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", cfg.sqlite_path)
        };
        let opts = SqliteConnectOptions::from_str(&target)
            .map_err(|e| storage_err("parsing sqlite_path", e))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(opts)
            .await
            .map_err(|e| storage_err("connecting to sqlite", e))?;
        let store = Self { pool };
        if cfg.auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    /// Wrap an already-open pool (tests, or a pool shared with other
    /// subsystems).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("running migrations: {e}")))
    }

    // ── Session operations ───────────────────────────────────────────

    /// Idempotent: on conflict, updates `title` (when non-empty) and
    /// touches `last_activity_at`.
    pub async fn create_session(
        &self,
        id: &str,
        user_id: Option<&str>,
        title: Option<&str>,
    ) -> Result<Session> {
        let now = Utc::now();
        let title = title.unwrap_or_default();
        let row = sqlx::query(
            r#"INSERT INTO sessions
                   (id, user_id, title, status, created_at, last_activity_at,
                    message_count, unread_count, metadata)
               VALUES (?1, ?2, ?3, 'active', ?4, ?4, 0, 0, '{}')
               ON CONFLICT(id) DO UPDATE SET
                   title = CASE WHEN excluded.title != '' THEN excluded.title ELSE sessions.title END,
                   last_activity_at = excluded.last_activity_at
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("creating session", e))?;
        row_to_session(&row)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("reading session", e))?;
        row.as_ref().map(row_to_session).transpose()
    }

    /// Patches title / status / metadata / unread_count. `metadata` is
    /// shallow-merged into the existing map.
    pub async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session> {
        let existing = self
            .get_session(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

        let title = patch.title.unwrap_or(existing.title);
        let status = patch.status.unwrap_or(existing.status);
        let unread_count = patch.unread_count.unwrap_or(existing.unread_count);
        let mut metadata = existing.metadata;
        if let Some(patch_meta) = patch.metadata {
            metadata.extend(patch_meta);
        }
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());
        let last_activity_at = if patch.touch_activity {
            Utc::now()
        } else {
            existing.last_activity_at
        };

        let row = sqlx::query(
            r#"UPDATE sessions
               SET title = ?1, status = ?2, unread_count = ?3, metadata = ?4, last_activity_at = ?5
               WHERE id = ?6
               RETURNING *"#,
        )
        .bind(&title)
        .bind(status.as_str())
        .bind(unread_count)
        .bind(&metadata_json)
        .bind(last_activity_at)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("updating session", e))?;
        row_to_session(&row)
    }

    pub async fn list_sessions(&self, query: ListSessionsQuery) -> Result<Vec<Session>> {
        let limit = query.limit.unwrap_or(50);
        let offset = query.offset.unwrap_or(0);
        let sort_col = match query.sort_by.as_deref() {
            Some("title") => "title",
            Some("message_count") => "message_count",
            Some("created_at") => "created_at",
            _ => "last_activity_at",
        };
        let order_sql = match query.sort_order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let mut sql = String::from("SELECT * FROM sessions WHERE 1 = 1");
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
        } else {
            sql.push_str(" AND status != 'deleted'");
        }
        if query.user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        sql.push_str(&format!(" ORDER BY {sort_col} {order_sql} LIMIT ? OFFSET ?"));

        let mut q = sqlx::query(&sql);
        if let Some(status) = query.status {
            q = q.bind(status.as_str().to_string());
        }
        if let Some(uid) = &query.user_id {
            q = q.bind(uid.clone());
        }
        q = q.bind(limit).bind(offset);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("listing sessions", e))?;
        rows.iter().map(row_to_session).collect()
    }

    /// Cascades to `messages` and `tool_executions` via foreign keys.
    pub async fn hard_delete_session(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("hard deleting session", e))?;
        Ok(())
    }

    // ── Message operations ───────────────────────────────────────────

    pub async fn append_message(
        &self,
        session_id: &str,
        kind: MessageType,
        content: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<Message> {
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());
        let now = Utc::now();
        let row = sqlx::query(
            r#"INSERT INTO messages (session_id, type, content, created_at, metadata)
               VALUES (?1, ?2, ?3, ?4, ?5)
               RETURNING *"#,
        )
        .bind(session_id)
        .bind(kind.as_str())
        .bind(content)
        .bind(now)
        .bind(&metadata_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("appending message", e))?;
        row_to_message(&row)
    }

    pub async fn read_messages(
        &self,
        session_id: &str,
        query: ReadMessagesQuery,
    ) -> Result<Vec<Message>> {
        let order = query.order.unwrap_or(SortOrder::Asc);
        let limit = query.limit.unwrap_or(100);
        let offset = query.offset.unwrap_or(0);
        let order_sql = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT * FROM messages WHERE session_id = ?1 \
             ORDER BY created_at {order_sql}, id {order_sql} LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("reading messages", e))?;
        rows.iter().map(row_to_message).collect()
    }

    /// Always returns ascending order regardless of how the last N were
    /// fetched (descending fetch, then reversed server-side).
    pub async fn read_last_messages(&self, session_id: &str, n: i64) -> Result<Vec<Message>> {
        let mut msgs = self
            .read_messages(
                session_id,
                ReadMessagesQuery {
                    limit: Some(n),
                    offset: None,
                    order: Some(SortOrder::Desc),
                },
            )
            .await?;
        msgs.reverse();
        Ok(msgs)
    }

    pub async fn search_messages(
        &self,
        user_id: &str,
        term: &str,
        limit: i64,
    ) -> Result<Vec<MessageSearchHit>> {
        let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let rows = sqlx::query(
            r#"SELECT m.* FROM messages m
               JOIN sessions s ON s.id = m.session_id
               WHERE s.user_id = ?1 AND s.status != 'deleted' AND m.content LIKE ?2 ESCAPE '\'
               ORDER BY m.created_at DESC, m.id DESC
               LIMIT ?3"#,
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("searching messages", e))?;
        rows.iter()
            .map(|r| row_to_message(r).map(|message| MessageSearchHit { message }))
            .collect()
    }

    // ── Tool execution operations ────────────────────────────────────

    /// Always inserted in `pending` status.
    pub async fn log_tool_execution(&self, rec: NewToolExecution) -> Result<i64> {
        let input_json = serde_json::to_string(&rec.tool_input).unwrap_or_else(|_| "{}".into());
        let metadata_json = serde_json::to_string(&rec.metadata).unwrap_or_else(|_| "{}".into());
        let now = Utc::now();
        let row = sqlx::query(
            r#"INSERT INTO tool_executions
                   (session_id, message_id, tool_name, tool_input, status, started_at, metadata)
               VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)
               RETURNING id"#,
        )
        .bind(&rec.session_id)
        .bind(rec.message_id)
        .bind(&rec.tool_name)
        .bind(&input_json)
        .bind(now)
        .bind(&metadata_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("logging tool execution", e))?;
        row.try_get::<i64, _>("id")
            .map_err(|e| storage_err("reading inserted tool_execution id", e))
    }

    /// The single terminal transition (`success` or `error`) for a
    /// tool execution row.
    pub async fn update_tool_execution(
        &self,
        id: i64,
        patch: ToolExecutionPatch,
    ) -> Result<ToolExecution> {
        let output_json = patch
            .tool_output
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "null".into()));
        let now = Utc::now();
        let row = sqlx::query(
            r#"UPDATE tool_executions
               SET status = ?1, tool_output = ?2, error_message = ?3, duration_ms = ?4,
                   completed_at = ?5, message_id = COALESCE(?6, message_id)
               WHERE id = ?7
               RETURNING *"#,
        )
        .bind(patch.status.as_str())
        .bind(output_json)
        .bind(&patch.error_message)
        .bind(patch.duration_ms)
        .bind(now)
        .bind(patch.message_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("updating tool execution", e))?;
        row_to_tool_execution(&row)
    }

    pub async fn get_tool_execution(&self, id: i64) -> Result<Option<ToolExecution>> {
        let row = sqlx::query("SELECT * FROM tool_executions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("reading tool execution", e))?;
        row.as_ref().map(row_to_tool_execution).transpose()
    }

    /// Marks every tool execution still `pending` as `error` with
    /// `errorMessage: "abandoned"` — called once at startup, before any
    /// new turns are accepted, to close out executions orphaned by a
    /// prior process crash.
    pub async fn abandon_stale_tool_executions(&self) -> Result<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"UPDATE tool_executions
               SET status = 'error', error_message = 'abandoned', completed_at = ?1
               WHERE status = 'pending'"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("abandoning stale tool executions", e))?;
        Ok(result.rows_affected())
    }
}

fn row_to_session(row: &SqliteRow) -> Result<Session> {
    let status_str: String = row
        .try_get("status")
        .map_err(|e| storage_err("reading session.status", e))?;
    let metadata_str: String = row
        .try_get("metadata")
        .map_err(|e| storage_err("reading session.metadata", e))?;
    Ok(Session {
        id: row
            .try_get("id")
            .map_err(|e| storage_err("reading session.id", e))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| storage_err("reading session.user_id", e))?,
        title: row
            .try_get("title")
            .map_err(|e| storage_err("reading session.title", e))?,
        status: SessionStatus::parse(&status_str).unwrap_or(SessionStatus::Active),
        created_at: row
            .try_get("created_at")
            .map_err(|e| storage_err("reading session.created_at", e))?,
        last_activity_at: row
            .try_get("last_activity_at")
            .map_err(|e| storage_err("reading session.last_activity_at", e))?,
        message_count: row
            .try_get("message_count")
            .map_err(|e| storage_err("reading session.message_count", e))?,
        unread_count: row
            .try_get("unread_count")
            .map_err(|e| storage_err("reading session.unread_count", e))?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
    })
}

fn row_to_message(row: &SqliteRow) -> Result<Message> {
    let kind_str: String = row
        .try_get("type")
        .map_err(|e| storage_err("reading message.type", e))?;
    let metadata_str: String = row
        .try_get("metadata")
        .map_err(|e| storage_err("reading message.metadata", e))?;
    Ok(Message {
        id: row
            .try_get("id")
            .map_err(|e| storage_err("reading message.id", e))?,
        session_id: row
            .try_get("session_id")
            .map_err(|e| storage_err("reading message.session_id", e))?,
        kind: MessageType::parse(&kind_str).unwrap_or(MessageType::User),
        content: row
            .try_get("content")
            .map_err(|e| storage_err("reading message.content", e))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| storage_err("reading message.created_at", e))?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> PersistentStore {
        let cfg = StoreConfig {
            sqlite_path: ":memory:".into(),
            max_connections: 1,
            auto_migrate: true,
        };
        PersistentStore::connect(&cfg).await.unwrap()
    }

    #[tokio::test]
    async fn create_session_is_idempotent_and_updates_title() {
        let store = test_store().await;
        let first = store.create_session("s1", Some("u1"), Some("first")).await.unwrap();
        assert_eq!(first.title, "first");
        assert_eq!(first.message_count, 0);

        let second = store.create_session("s1", Some("u1"), Some("renamed")).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "renamed");
        assert!(second.last_activity_at >= first.last_activity_at);

        // Re-creating with an empty title leaves the existing title alone.
        let third = store.create_session("s1", Some("u1"), None).await.unwrap();
        assert_eq!(third.title, "renamed");
    }

    #[tokio::test]
    async fn append_message_ids_strictly_increase_and_order_matches() {
        let store = test_store().await;
        store.create_session("s1", None, None).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..10 {
            let msg = store
                .append_message("s1", MessageType::User, &format!("msg {i}"), Default::default())
                .await
                .unwrap();
            ids.push(msg.id);
        }
        // Strictly increasing ids in program order.
        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0]);
        }

        let read = store
            .read_messages("s1", ReadMessagesQuery::default())
            .await
            .unwrap();
        let read_ids: Vec<i64> = read.iter().map(|m| m.id).collect();
        assert_eq!(read_ids, ids, "ascending (createdAt, id) order must match insert order");
    }

    #[tokio::test]
    async fn message_count_trigger_matches_successful_appends() {
        let store = test_store().await;
        let session = store.create_session("s1", None, None).await.unwrap();
        assert_eq!(session.message_count, 0);

        for i in 0..7 {
            store
                .append_message("s1", MessageType::Assistant, &format!("reply {i}"), Default::default())
                .await
                .unwrap();
        }

        let reloaded = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(reloaded.message_count, 7, "message_count must be trigger-maintained, never computed by counting");
    }

    #[tokio::test]
    async fn read_last_messages_returns_ascending_order() {
        let store = test_store().await;
        store.create_session("s1", None, None).await.unwrap();
        for i in 0..5 {
            store
                .append_message("s1", MessageType::User, &format!("m{i}"), Default::default())
                .await
                .unwrap();
        }

        let last3 = store.read_last_messages("s1", 3).await.unwrap();
        let contents: Vec<&str> = last3.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn tool_execution_single_terminal_transition() {
        let store = test_store().await;
        store.create_session("s1", None, None).await.unwrap();

        let id = store
            .log_tool_execution(NewToolExecution {
                session_id: "s1".into(),
                message_id: None,
                tool_name: "contact_search".into(),
                tool_input: serde_json::json!({"query": "Peter Kelly"}),
                metadata: Default::default(),
            })
            .await
            .unwrap();

        let pending = store.get_tool_execution(id).await.unwrap().unwrap();
        assert_eq!(pending.status, ToolExecutionStatus::Pending);
        assert!(pending.completed_at.is_none());

        let updated = store
            .update_tool_execution(
                id,
                ToolExecutionPatch {
                    status: ToolExecutionStatus::Success,
                    tool_output: Some(serde_json::json!({"found": true})),
                    error_message: None,
                    duration_ms: Some(42),
                    message_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ToolExecutionStatus::Success);
        assert!(updated.completed_at.unwrap() >= updated.started_at);
        assert_eq!(updated.duration_ms, Some(42));
    }

    #[tokio::test]
    async fn abandon_stale_tool_executions_marks_pending_as_error() {
        let store = test_store().await;
        store.create_session("s1", None, None).await.unwrap();
        let id = store
            .log_tool_execution(NewToolExecution {
                session_id: "s1".into(),
                message_id: None,
                tool_name: "crm.update_deal".into(),
                tool_input: serde_json::json!({}),
                metadata: Default::default(),
            })
            .await
            .unwrap();

        let abandoned = store.abandon_stale_tool_executions().await.unwrap();
        assert_eq!(abandoned, 1);

        let row = store.get_tool_execution(id).await.unwrap().unwrap();
        assert_eq!(row.status, ToolExecutionStatus::Error);
        assert_eq!(row.error_message.as_deref(), Some("abandoned"));
    }

    #[tokio::test]
    async fn soft_delete_excludes_from_default_listing_but_keeps_messages() {
        let store = test_store().await;
        store.create_session("s1", Some("u1"), Some("to delete")).await.unwrap();
        store
            .append_message("s1", MessageType::User, "still here", Default::default())
            .await
            .unwrap();
        store
            .update_session(
                "s1",
                SessionPatch {
                    status: Some(SessionStatus::Deleted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let default_listing = store.list_sessions(ListSessionsQuery::default()).await.unwrap();
        assert!(default_listing.iter().all(|s| s.id != "s1"));

        let deleted_listing = store
            .list_sessions(ListSessionsQuery {
                status: Some(SessionStatus::Deleted),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(deleted_listing.iter().any(|s| s.id == "s1"));

        let messages = store
            .read_messages("s1", ReadMessagesQuery::default())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1, "soft delete must not touch messages");
    }

    #[tokio::test]
    async fn hard_delete_cascades_messages_and_tool_executions() {
        let store = test_store().await;
        store.create_session("s3", None, None).await.unwrap();
        for i in 0..5 {
            store
                .append_message("s3", MessageType::User, &format!("m{i}"), Default::default())
                .await
                .unwrap();
        }
        let mut exec_ids = Vec::new();
        for _ in 0..2 {
            let id = store
                .log_tool_execution(NewToolExecution {
                    session_id: "s3".into(),
                    message_id: None,
                    tool_name: "memory.search".into(),
                    tool_input: serde_json::json!({}),
                    metadata: Default::default(),
                })
                .await
                .unwrap();
            exec_ids.push(id);
        }

        // A user-facing delete only soft-deletes; an admin hard-delete is a
        // separate, second step.
        store
            .update_session(
                "s3",
                SessionPatch {
                    status: Some(SessionStatus::Deleted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.get_session("s3").await.unwrap().is_some(), "soft delete keeps the row");

        store.hard_delete_session("s3").await.unwrap();

        assert!(store.get_session("s3").await.unwrap().is_none());
        let messages = store.read_messages("s3", ReadMessagesQuery::default()).await.unwrap();
        assert!(messages.is_empty(), "hard delete must cascade messages");
        for id in exec_ids {
            assert!(
                store.get_tool_execution(id).await.unwrap().is_none(),
                "hard delete must cascade tool_executions"
            );
        }
    }

    #[tokio::test]
    async fn search_messages_scopes_by_user_and_excludes_deleted_sessions() {
        let store = test_store().await;
        store.create_session("s1", Some("alice"), None).await.unwrap();
        store.create_session("s2", Some("bob"), None).await.unwrap();
        store
            .append_message("s1", MessageType::User, "find Peter Kelly please", Default::default())
            .await
            .unwrap();
        store
            .append_message("s2", MessageType::User, "find Peter Kelly too", Default::default())
            .await
            .unwrap();

        let hits = store.search_messages("alice", "Peter Kelly", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.session_id, "s1");

        store
            .update_session(
                "s1",
                SessionPatch {
                    status: Some(SessionStatus::Deleted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let after_delete = store.search_messages("alice", "Peter Kelly", 10).await.unwrap();
        assert!(after_delete.is_empty(), "search must exclude deleted sessions");
    }

    #[tokio::test]
    async fn update_session_shallow_merges_metadata() {
        let store = test_store().await;
        store.create_session("s1", None, None).await.unwrap();
        let mut first_meta = HashMap::new();
        first_meta.insert("lastAgent".to_string(), serde_json::json!("analytical"));
        store
            .update_session(
                "s1",
                SessionPatch {
                    metadata: Some(first_meta),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut second_meta = HashMap::new();
        second_meta.insert("agentLock".to_string(), serde_json::json!(true));
        let updated = store
            .update_session(
                "s1",
                SessionPatch {
                    metadata: Some(second_meta),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.metadata.get("lastAgent"), Some(&serde_json::json!("analytical")));
        assert_eq!(updated.metadata.get("agentLock"), Some(&serde_json::json!(true)));
    }
}

fn row_to_tool_execution(row: &SqliteRow) -> Result<ToolExecution> {
    let status_str: String = row
        .try_get("status")
        .map_err(|e| storage_err("reading tool_execution.status", e))?;
    let input_str: String = row
        .try_get("tool_input")
        .map_err(|e| storage_err("reading tool_execution.tool_input", e))?;
    let output_str: Option<String> = row
        .try_get("tool_output")
        .map_err(|e| storage_err("reading tool_execution.tool_output", e))?;
    let metadata_str: String = row
        .try_get("metadata")
        .map_err(|e| storage_err("reading tool_execution.metadata", e))?;
    Ok(ToolExecution {
        id: row
            .try_get("id")
            .map_err(|e| storage_err("reading tool_execution.id", e))?,
        session_id: row
            .try_get("session_id")
            .map_err(|e| storage_err("reading tool_execution.session_id", e))?,
        message_id: row
            .try_get("message_id")
            .map_err(|e| storage_err("reading tool_execution.message_id", e))?,
        tool_name: row
            .try_get("tool_name")
            .map_err(|e| storage_err("reading tool_execution.tool_name", e))?,
        tool_input: serde_json::from_str(&input_str).unwrap_or(Value::Null),
        tool_output: output_str.and_then(|s| serde_json::from_str(&s).ok()),
        status: ToolExecutionStatus::parse(&status_str).unwrap_or(ToolExecutionStatus::Pending),
        started_at: row
            .try_get("started_at")
            .map_err(|e| storage_err("reading tool_execution.started_at", e))?,
        completed_at: row
            .try_get("completed_at")
            .map_err(|e| storage_err("reading tool_execution.completed_at", e))?,
        duration_ms: row
            .try_get("duration_ms")
            .map_err(|e| storage_err("reading tool_execution.duration_ms", e))?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| storage_err("reading tool_execution.error_message", e))?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
    })
}

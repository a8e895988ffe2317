//! Chat sessions and messages.

use crate::database::Database;
use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use scribe_common::{ChatMessage, ChatSender, ChatSession};
use sqlx::types::Json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    patient_id: Uuid,
    trial_id: String,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for ChatSession {
    fn from(row: SessionRow) -> Self {
        ChatSession {
            id: row.id,
            patient_id: row.patient_id,
            trial_id: row.trial_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    sender: String,
    message: String,
    metadata: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = DbError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(ChatMessage {
            id: row.id,
            session_id: row.session_id,
            sender: row.sender.parse()?,
            message: row.message,
            metadata: row.metadata.0,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct ChatRepository {
    db: Arc<Database>,
}

impl ChatRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create_session(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        title: Option<&str>,
    ) -> Result<ChatSession> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4(),
            patient_id,
            trial_id: trial_id.to_string(),
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO chat_sessions (id, patient_id, trial_id, title, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id)
        .bind(session.patient_id)
        .bind(&session.trial_id)
        .bind(&session.title)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(session)
    }

    pub async fn find_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, patient_id, trial_id, title, created_at, updated_at FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_sessions(&self, patient_id: Uuid) -> Result<Vec<ChatSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, patient_id, trial_id, title, created_at, updated_at FROM chat_sessions \
             WHERE patient_id = ? ORDER BY rowid DESC",
        )
        .bind(patient_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn add_message(
        &self,
        session_id: Uuid,
        sender: ChatSender,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<ChatMessage> {
        let msg = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            sender,
            message: message.to_string(),
            metadata,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, sender, message, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.id)
        .bind(msg.session_id)
        .bind(msg.sender.as_str())
        .bind(&msg.message)
        .bind(Json(&msg.metadata))
        .bind(msg.created_at)
        .execute(self.db.pool())
        .await?;

        sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(msg.created_at)
            .bind(session_id)
            .execute(self.db.pool())
            .await?;

        Ok(msg)
    }

    /// Whole conversation, oldest first.
    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, session_id, sender, message, metadata, created_at FROM chat_messages \
             WHERE session_id = ? ORDER BY rowid ASC",
        )
        .bind(session_id)
        .fetch_all(self.db.pool())
        .await?;
        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    /// The last `limit` messages, oldest first.
    pub async fn recent_messages(&self, session_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, session_id, sender, message, metadata, created_at FROM ( \
                SELECT rowid AS seq, * FROM chat_messages WHERE session_id = ? ORDER BY rowid DESC LIMIT ? \
             ) ORDER BY seq ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        rows.into_iter().map(ChatMessage::try_from).collect()
    }
}

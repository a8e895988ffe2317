//! Transcript status change notifications.

use chrono::{DateTime, Utc};
use scribe_common::{Transcript, TranscriptStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const EVENT_CAPACITY: usize = 256;

/// Emitted on every transcript status change (cloneable for broadcast).
/// The feed is unauthenticated, so it carries ids and status only; clients
/// fetch details through the authorized API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEvent {
    pub transcript_id: Uuid,
    pub status: TranscriptStatus,
    pub at: DateTime<Utc>,
}

impl TranscriptEvent {
    pub fn of(t: &Transcript) -> Self {
        Self {
            transcript_id: t.id,
            status: t.status,
            at: t.updated_at,
        }
    }
}

pub fn channel() -> broadcast::Sender<TranscriptEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

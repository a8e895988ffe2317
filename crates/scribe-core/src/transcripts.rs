//! Transcript lifecycle.
//!
//! ```text
//! create ──► PENDING ──► PROCESSING ──► COMPLETED
//!                ▲             │
//!                │             └──────► FAILED
//!                └── reprocess ◄────────┘ (also from COMPLETED)
//! ```
//!
//! Processing runs on a spawned task; every status change is broadcast as a
//! [`TranscriptEvent`].

use chrono::{DateTime, Utc};
use scribe_common::{Transcript, TranscriptStatus};
use scribe_db::{PatientRepository, StatusCounts, TranscriptRepository};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::analyzer::TranscriptAnalyzer;
use crate::error::{Result, ServiceError};
use crate::events::TranscriptEvent;

/// Error recorded on transcripts whose worker did not finish.
pub const INTERRUPTED: &str = "Processing was interrupted; reprocess to retry";

#[derive(Clone)]
pub struct TranscriptService {
    transcripts: TranscriptRepository,
    patients: PatientRepository,
    analyzer: Arc<dyn TranscriptAnalyzer>,
    events: broadcast::Sender<TranscriptEvent>,
}

impl TranscriptService {
    pub fn new(
        transcripts: TranscriptRepository,
        patients: PatientRepository,
        analyzer: Arc<dyn TranscriptAnalyzer>,
        events: broadcast::Sender<TranscriptEvent>,
    ) -> Self {
        Self { transcripts, patients, analyzer, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.events.subscribe()
    }

    /// Store a PENDING transcript. Processing is started separately with
    /// [`spawn_process`](Self::spawn_process).
    #[instrument(skip(self, raw_transcript))]
    pub async fn create(
        &self,
        patient_id: Uuid,
        raw_transcript: &str,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<Transcript> {
        let raw = raw_transcript.trim();
        if raw.is_empty() {
            return Err(ServiceError::validation("raw_transcript", "Transcript text is required"));
        }
        self.patients.get(patient_id).await?;

        let transcript = self.transcripts.create(patient_id, Some(raw), recorded_at).await?;
        info!(transcript_id = %transcript.id, "Transcript stored");
        self.publish(&transcript);
        Ok(transcript)
    }

    /// Run the analyzer on a transcript. The returned record is COMPLETED or
    /// FAILED; an analyzer failure is recorded on the transcript, not
    /// returned as an error.
    #[instrument(skip(self))]
    pub async fn process(&self, id: Uuid) -> Result<Transcript> {
        if !self.transcripts.try_start_processing(id).await? {
            return Err(ServiceError::Conflict(format!("transcript {id} is already processing")));
        }
        let processing = self.transcripts.get(id).await?;
        self.publish(&processing);

        let outcome = match processing.raw_transcript.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => self.analyzer.analyze(raw).await.map_err(|e| e.to_string()),
            _ => Err("Transcript has no text to analyze".to_string()),
        };

        let recorded = match outcome {
            Ok(parsed) => {
                debug!(%parsed, "Analysis succeeded");
                self.transcripts.mark_completed(id, &parsed).await
            }
            Err(message) => {
                warn!(error = %message, "Analysis failed");
                self.transcripts.mark_failed(id, &message).await
            }
        };
        let finished = match recorded {
            Ok(t) => t,
            Err(e) => {
                // Release the claim so the transcript can be reprocessed.
                error!(error = %e, "Failed to record analysis result");
                let message = format!("Failed to record result: {e}");
                if let Ok(failed) = self.transcripts.mark_failed(id, &message).await {
                    self.publish(&failed);
                }
                return Err(e.into());
            }
        };
        info!(status = %finished.status, "Transcript processed");
        self.publish(&finished);
        Ok(finished)
    }

    /// Start [`process`](Self::process) in the background.
    pub fn spawn_process(&self, id: Uuid) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.process(id).await {
                error!(transcript_id = %id, error = %e, "Background processing failed");
            }
        })
    }

    /// Re-run analysis on a transcript that is not currently processing.
    #[instrument(skip(self))]
    pub async fn reprocess(&self, id: Uuid) -> Result<Transcript> {
        let transcript = self.transcripts.get(id).await?;
        if !transcript.status.can_start_processing() {
            return Err(ServiceError::Conflict(format!("transcript {id} is already processing")));
        }
        self.spawn_process(id);
        Ok(transcript)
    }

    /// Fail transcripts left PROCESSING by a previous run.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let n = self.transcripts.fail_interrupted(INTERRUPTED).await?;
        if n > 0 {
            warn!(count = n, "Marked interrupted transcripts as failed");
        }
        Ok(n)
    }

    pub async fn get(&self, id: Uuid) -> Result<Transcript> {
        Ok(self.transcripts.get(id).await?)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Transcript>> {
        self.patients.get(patient_id).await?;
        Ok(self.transcripts.list_for_patient(patient_id).await?)
    }

    pub async fn list_all(&self, status: Option<TranscriptStatus>) -> Result<Vec<Transcript>> {
        Ok(self.transcripts.list(status).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        Ok(self.transcripts.delete(id).await?)
    }

    pub async fn count_by_status(&self) -> Result<StatusCounts> {
        Ok(self.transcripts.count_by_status().await?)
    }

    fn publish(&self, t: &Transcript) {
        // No subscribers is fine.
        let _ = self.events.send(TranscriptEvent::of(t));
    }
}

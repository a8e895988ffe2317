//! Patient Q&A about a single trial.

use chrono::{NaiveDate, Utc};
use scribe_common::{ChatMessage, ChatSender, ChatSession, ClinicalTrial, Patient};
use scribe_db::{ChatRepository, PatientRepository};
use scribe_llm::{CompletionOptions, LlmClient};
use serde_json::json;
use std::fmt::Write;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::matching::ClinicalTrialService;

/// Messages of history included in each prompt, the new question included.
pub const HISTORY_WINDOW: i64 = 4;

const SYSTEM_PROMPT: &str = "You are a clinical trial professional. \
Use the following patient and clinical trial information to answer the user's question. \
Be accurate, clear, and empathetic.";

#[derive(Clone)]
pub struct ChatService {
    chat: ChatRepository,
    patients: PatientRepository,
    matching: ClinicalTrialService,
    llm: LlmClient,
}

impl ChatService {
    pub fn new(
        chat: ChatRepository,
        patients: PatientRepository,
        matching: ClinicalTrialService,
        llm: LlmClient,
    ) -> Self {
        Self { chat, patients, matching, llm }
    }

    /// Open a conversation. The title defaults to the trial's brief title.
    #[instrument(skip(self, title))]
    pub async fn create_session(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        title: Option<&str>,
    ) -> Result<ChatSession> {
        self.patients.get(patient_id).await?;
        let trial = self.matching.get_clinical_trial(trial_id).await?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&trial.brief_title);
        Ok(self.chat.create_session(patient_id, trial_id, Some(title)).await?)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<ChatSession> {
        self.chat
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("chat session {session_id}")))
    }

    pub async fn list_sessions(&self, patient_id: Uuid) -> Result<Vec<ChatSession>> {
        Ok(self.chat.list_sessions(patient_id).await?)
    }

    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.get_session(session_id).await?;
        Ok(self.chat.list_messages(session_id).await?)
    }

    /// Store the question, ask the LLM with the recent history, store and
    /// return the reply. The question stays stored if the LLM call fails.
    #[instrument(skip(self, message))]
    pub async fn ask(&self, session_id: Uuid, message: &str) -> Result<ChatMessage> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::validation("message", "Message cannot be empty"));
        }
        let session = self.get_session(session_id).await?;
        let patient = self.patients.get(session.patient_id).await?;
        let trial = self.matching.get_clinical_trial(&session.trial_id).await?;

        self.chat
            .add_message(session_id, ChatSender::User, message, json!({}))
            .await?;
        let history = self.chat.recent_messages(session_id, HISTORY_WINDOW).await?;

        let prompt = chat_prompt(&patient, &trial, &history, Utc::now().date_naive());
        let reply = self
            .llm
            .complete_text("trial_chat", &prompt, CompletionOptions::default())
            .await?;

        let bot = self
            .chat
            .add_message(
                session_id,
                ChatSender::Bot,
                reply.trim(),
                json!({ "model": self.llm.model_id() }),
            )
            .await?;
        info!(history = history.len(), "Chat reply stored");
        Ok(bot)
    }
}

fn or_na(v: Option<&str>) -> &str {
    v.unwrap_or("N/A")
}

fn date_or_unknown(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "Unknown".to_string())
}

pub fn chat_prompt(patient: &Patient, trial: &ClinicalTrial, history: &[ChatMessage], today: NaiveDate) -> String {
    let interventions = if trial.interventions.is_empty() {
        "None specified".to_string()
    } else {
        trial
            .interventions
            .iter()
            .map(|iv| match iv.intervention_type.as_str() {
                "" => iv.name.clone(),
                kind => format!("{} ({kind})", iv.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let conditions = if trial.conditions.is_empty() {
        "None specified".to_string()
    } else {
        trial.conditions.join(", ")
    };

    let mut p = String::new();
    let _ = writeln!(p, "{SYSTEM_PROMPT}");
    let _ = writeln!(p);
    let _ = writeln!(
        p,
        "Patient: {}, Age: {}, Sex: {}",
        patient.full_name(),
        patient.age_on(today),
        patient.sex
    );
    let _ = writeln!(p);
    let _ = writeln!(p, "Clinical Trial Details:");
    let _ = writeln!(p, "- Title: {}", trial.brief_title);
    let _ = writeln!(p, "- Official Title: {}", or_na(trial.official_title.as_deref()));
    let _ = writeln!(p, "- Status: {}", trial.status);
    let _ = writeln!(p, "- Conditions: {conditions}");
    let _ = writeln!(p, "- Study Type: {}", or_na(trial.study_type.as_deref()));
    let _ = writeln!(p, "- Brief Summary: {}", or_na(trial.brief_summary.as_deref()));
    let _ = writeln!(p, "- Detailed Description: {}", or_na(trial.detailed_description.as_deref()));
    let _ = writeln!(p, "- Eligibility Criteria: {}", or_na(trial.eligibility_criteria.as_deref()));
    let _ = writeln!(p, "- Interventions: {interventions}");
    let _ = writeln!(p, "- Start Date: {}", date_or_unknown(trial.start_date));
    let _ = writeln!(p, "- Primary Completion Date: {}", date_or_unknown(trial.primary_completion_date));
    let _ = writeln!(p, "- Completion Date: {}", date_or_unknown(trial.completion_date));
    let _ = writeln!(p, "- Last Updated: {}", date_or_unknown(trial.last_updated));
    let _ = writeln!(p);
    let _ = writeln!(p, "Chat History:");
    for msg in history {
        let _ = writeln!(p, "{}: {}", msg.sender.prompt_role(), msg.message);
    }
    let _ = write!(p, "Clinical Trial Professional:");
    p
}

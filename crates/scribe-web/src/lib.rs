//! scribe-web: HTTP API for TranscriptScribe.
//!
//!   - admin API: patients, transcripts, trial matching, provider recommendations
//!   - patient portal API under `/api/v1/me`
//!   - ClinicalTrials.gov pass-through proxy
//!   - SSE feed of transcript status changes and an operator dashboard

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;

//! HTTP handlers for all web routes.

pub mod chat;
pub mod dashboard;
pub mod health;
pub mod patients;
pub mod portal;
pub mod proxy;
pub mod transcripts;
pub mod trials;

//! Shared application state for the web server.

use minijinja::Environment;
use scribe_core::Services;
use scribe_db::Database;
use scribe_llm::LlmClient;
use scribe_trials::{ClinicalTrialsSource, RegistryProxy};
use std::sync::Arc;

use crate::auth::AuthSettings;

const DASHBOARD_TEMPLATE: &str = include_str!("../templates/dashboard.html");

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub db: Arc<Database>,
    pub services: Services,
    pub registry: Arc<dyn ClinicalTrialsSource>,
    pub proxy: RegistryProxy,
    pub llm: LlmClient,
    pub auth: AuthSettings,
    pub templates: Environment<'static>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<dyn ClinicalTrialsSource>,
        llm: LlmClient,
        proxy: RegistryProxy,
        auth: AuthSettings,
    ) -> anyhow::Result<Self> {
        let services = Services::new(db.clone(), registry.clone(), llm.clone());
        Ok(Self {
            db,
            services,
            registry,
            proxy,
            llm,
            auth,
            templates: templates()?,
        })
    }
}

fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("dashboard.html", DASHBOARD_TEMPLATE)?;
    Ok(env)
}

pub type SharedState = Arc<AppState>;

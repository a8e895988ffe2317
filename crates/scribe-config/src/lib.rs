//! Configuration loading for TranscriptScribe.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults;
//! 2. a TOML or YAML file (`SCRIBE_CONFIG`, else `scribe.toml` when present);
//! 3. a `.env` file in the working directory;
//! 4. process environment variables.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub registry: RegistryConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_bind_addr()    -> String      { "0.0.0.0:8000".to_string() }
fn default_cors_origins() -> Vec<String> { vec!["http://localhost:3000".to_string()] }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), cors_origins: default_cors_origins() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url()    -> String { "sqlite://transcriptscribe.db?mode=rwc".to_string() }
fn default_max_connections() -> u32    { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), max_connections: default_max_connections() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_registry_base_url() -> String { "https://clinicaltrials.gov/api/v2".to_string() }
fn default_registry_timeout()  -> u64    { 30 }
fn default_page_size()         -> u32    { 50 }

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_base_url(),
            timeout_secs: default_registry_timeout(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackendKind {
    Gemini,
    OpenaiCompatible,
    Ollama,
}

impl LlmBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackendKind::Gemini           => "gemini",
            LlmBackendKind::OpenaiCompatible => "openai_compatible",
            LlmBackendKind::Ollama           => "ollama",
        }
    }

    /// Remote backends need an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmBackendKind::Ollama)
    }
}

impl fmt::Display for LlmBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini"                              => Ok(LlmBackendKind::Gemini),
            "openai_compatible" | "openai" | "compat" => Ok(LlmBackendKind::OpenaiCompatible),
            "ollama"                              => Ok(LlmBackendKind::Ollama),
            other => Err(ConfigError::Invalid(format!("unknown LLM backend '{other}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_backend")]
    pub backend: LlmBackendKind,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Override for the provider endpoint. Required for `openai_compatible`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_backend() -> LlmBackendKind { LlmBackendKind::Gemini }
fn default_llm_model()   -> String         { "gemini-2.0-flash".to_string() }
fn default_llm_timeout() -> u64            { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_llm_backend(),
            model: default_llm_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub jwt_secret: Option<SecretString>,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
    #[serde(default = "default_patient_role")]
    pub patient_role: String,
}

fn default_audience()     -> String { "authenticated".to_string() }
fn default_admin_role()   -> String { "admin".to_string() }
fn default_patient_role() -> String { "patient".to_string() }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            audience: default_audience(),
            admin_role: default_admin_role(),
            patient_role: default_patient_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn deserialize_secret<'de, D>(d: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?
        .filter(|s| !s.is_empty())
        .map(SecretString::from))
}

impl AppConfig {
    /// Full load: optional file, `.env`, then environment overrides.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::Invalid(format!(".env: {e}"))),
        }

        let explicit = std::env::var("SCRIBE_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "scribe.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            info!(%path, "Loading configuration file");
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ConfigError::Invalid(format!("config file not found: {path}")));
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml")         => Self::from_toml(&content),
            Some("yaml" | "yml") => Self::from_yaml(&content),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_URL")      { self.database.url = v; }
        if let Some(v) = get("BIND_ADDR")         { self.server.bind_addr = v; }
        if let Some(v) = get("REGISTRY_BASE_URL") { self.registry.base_url = v; }
        if let Some(v) = get("LLM_MODEL")         { self.llm.model = v; }
        if let Some(v) = get("LLM_BASE_URL")      { self.llm.base_url = Some(v); }
        if let Some(v) = get("LOG_LEVEL")         { self.logging.level = v.to_ascii_lowercase(); }

        if let Some(v) = get("LLM_BACKEND") {
            match v.parse() {
                Ok(kind) => self.llm.backend = kind,
                Err(e) => tracing::warn!(value = %v, error = %e, "Ignoring LLM_BACKEND"),
            }
        }

        if let Some(v) = get("LLM_API_KEY").or_else(|| get("GOOGLE_AI_API_KEY")) {
            self.llm.api_key = Some(SecretString::from(v));
        }
        if let Some(v) = get("JWT_SECRET").or_else(|| get("SUPABASE_JWT_SECRET")) {
            self.auth.jwt_secret = Some(SecretString::from(v));
        }
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.as_ref().map_or(true, |s| s.expose_secret().is_empty()) {
            return Err(ConfigError::Invalid(
                "JWT secret is not set (auth.jwt_secret, JWT_SECRET or SUPABASE_JWT_SECRET)".into(),
            ));
        }
        if self.llm.backend.requires_api_key() && self.llm.api_key.is_none() {
            return Err(ConfigError::Invalid(format!(
                "LLM backend '{}' needs an API key (llm.api_key, LLM_API_KEY or GOOGLE_AI_API_KEY)",
                self.llm.backend
            )));
        }
        if self.llm.backend == LlmBackendKind::OpenaiCompatible && self.llm.base_url.is_none() {
            return Err(ConfigError::Invalid("openai_compatible backend needs llm.base_url".into()));
        }
        if self.registry.page_size == 0 || self.registry.page_size > 1000 {
            return Err(ConfigError::Invalid("registry.page_size must be in 1..=1000".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        Ok(())
    }
}

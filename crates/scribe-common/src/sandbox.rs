use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::ScribeError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client that refuses to talk to hosts outside an allowlist.
///
/// Every outbound call in the backend (registry, LLM providers) goes
/// through this type. A host matches when it equals an allowlisted name or
/// is a subdomain of one.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    pub fn new() -> Result<Self, ScribeError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ScribeError> {
        let allowlist = [
            "clinicaltrials.gov",                // registry
            "generativelanguage.googleapis.com", // Gemini
            "api.openai.com",
            "localhost",                         // Ollama, local gateways
            "127.0.0.1",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("transcriptscribe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScribeError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, allowlist })
    }

    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_ascii_lowercase());
    }

    /// Allow the host of a configured base URL (registry mirror, LLM gateway).
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), ScribeError> {
        let parsed = Url::parse(url)
            .map_err(|e| ScribeError::Config(format!("Invalid URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ScribeError::Config(format!("URL has no host: {url}")))?;
        self.allow_domain(host);
        Ok(())
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.allowlist
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, ScribeError> {
        self.request(reqwest::Method::GET, url)
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, ScribeError> {
        self.request(reqwest::Method::POST, url)
    }

    pub fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, ScribeError> {
        if !self.is_allowed(url) {
            warn!(%url, "Blocked outbound request to host outside allowlist");
            return Err(ScribeError::Security(format!("host not in allowlist for URL {url}")));
        }
        Ok(self.client.request(method, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let sb = SandboxClient::new().unwrap();
        assert!(sb.is_allowed("https://clinicaltrials.gov/api/v2/studies"));
        assert!(sb.is_allowed("https://beta-ut.clinicaltrials.gov/api/v2/studies"));
        assert!(sb.is_allowed("http://localhost:11434/api/chat"));
        assert!(!sb.is_allowed("https://evil.example.com/"));
        assert!(!sb.is_allowed("https://notclinicaltrials.gov/"));
        assert!(!sb.is_allowed("not a url"));
    }

    #[test]
    fn test_blocked_request_is_security_error() {
        let sb = SandboxClient::new().unwrap();
        assert!(matches!(sb.get("https://evil.example.com/"), Err(ScribeError::Security(_))));
    }

    #[test]
    fn test_allow_url_host() {
        let mut sb = SandboxClient::new().unwrap();
        sb.allow_url_host("https://llm.internal.example:8443/v1").unwrap();
        assert!(sb.is_allowed("https://llm.internal.example:8443/v1/chat/completions"));
        assert!(sb.allow_url_host("nope").is_err());
    }
}

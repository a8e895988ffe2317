//! Pass-through proxy to the registry API.
//!
//! The portals call the registry same-origin through this relay. Query string
//! and body are forwarded as received; the upstream status, content type and
//! body come back unchanged. No retries.

use bytes::Bytes;
use reqwest::Method;
use scribe_common::SandboxClient;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct RegistryProxy {
    client: SandboxClient,
    base_url: String,
}

impl RegistryProxy {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut client = SandboxClient::with_timeout(timeout)?;
        client.allow_url_host(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upstream URL for a proxied path. Rejects traversal and anything that
    /// is not a plain relative path; the resolved URL must stay under the
    /// base path.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Result<String> {
        let path = path.trim_start_matches('/');
        let invalid = || RegistryError::InvalidPath(path.to_string());
        if path.split('/').any(is_dot_segment) || path.contains("://") || path.contains('\\') {
            return Err(invalid());
        }

        let mut url = format!("{}/{}", self.base_url, path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }

        let base = Url::parse(&self.base_url).map_err(|e| RegistryError::Config(e.to_string()))?;
        let resolved = Url::parse(&url).map_err(|_| invalid())?;
        let base_path = base.path().trim_end_matches('/');
        let under_base = resolved.path() == base_path
            || resolved.path().starts_with(&format!("{base_path}/"));
        if resolved.origin() != base.origin() || !under_base {
            return Err(invalid());
        }
        Ok(url)
    }

    #[instrument(skip(self, body, content_type), fields(bytes = body.len()))]
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        let url = self.target_url(path, query)?;
        let mut req = self
            .client
            .request(method.clone(), &url)?
            .header(reqwest::header::ACCEPT, "application/json");
        if method != Method::GET && method != Method::HEAD {
            if let Some(ct) = content_type {
                req = req.header(reqwest::header::CONTENT_TYPE, ct);
            }
            req = req.body(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;
        debug!(%url, status, "Registry proxy response");

        Ok(ProxyResponse { status, content_type, body })
    }
}

/// `.` or `..`, with any mix of literal and percent-encoded dots.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> RegistryProxy {
        RegistryProxy::new("https://clinicaltrials.gov/api/v2/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_target_url_joins_path_and_query() {
        let p = proxy();
        assert_eq!(
            p.target_url("/studies", Some("query.term=asthma&pageSize=5")).unwrap(),
            "https://clinicaltrials.gov/api/v2/studies?query.term=asthma&pageSize=5"
        );
        assert_eq!(
            p.target_url("studies/NCT01234567", None).unwrap(),
            "https://clinicaltrials.gov/api/v2/studies/NCT01234567"
        );
        assert_eq!(p.target_url("version", Some("")).unwrap(), "https://clinicaltrials.gov/api/v2/version");
    }

    #[test]
    fn test_traversal_rejected() {
        let p = proxy();
        for bad in [
            "../admin",
            "studies/../../x",
            "http://evil.example/",
            "a\\b",
            "%2e%2e/x",
            ".%2e/.%2e/secret",
            "%2e./%2e./secret",
            "%2E%2e/%2e%2E/secret",
            "studies/./x",
        ] {
            assert!(matches!(p.target_url(bad, None), Err(RegistryError::InvalidPath(_))), "{bad}");
        }
    }
}

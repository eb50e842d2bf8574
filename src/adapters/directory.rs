//! Directory search capability: job scope + location -> candidates.
//!
//! Talks to an external professional-directory service over HTTP. The
//! directory owns discovery (listings, ratings, licensing data); this
//! adapter only shapes the query and the response. An empty result set
//! is a valid outcome, not an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{Candidate, CandidateList, DirectoryQuery, Stage};

use super::{StageAdapter, StageError};

const SERVICE: &str = "directory";

/// HTTP client for the professional directory
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    professionals: Vec<Candidate>,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl StageAdapter for HttpDirectory {
    type Input = DirectoryQuery;
    type Output = CandidateList;

    fn stage(&self) -> Stage {
        Stage::Search
    }

    fn name(&self) -> &str {
        SERVICE
    }

    async fn invoke(&self, input: DirectoryQuery) -> Result<CandidateList, StageError> {
        let body = serde_json::json!({
            "trade": input.scope.trade,
            "services": input.scope.services,
            "city": input.city,
            "state": input.state,
        });

        let request = self
            .client
            .post(self.endpoint("professionals/search"))
            .json(&body)
            .send();

        let response = timeout(self.timeout, request)
            .await
            .map_err(|_| StageError::timeout(SERVICE, self.timeout))?
            .map_err(|e| StageError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::transport(SERVICE, format!("HTTP {}", status)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| StageError::bad_response(SERVICE, e))?;

        debug!(
            job_id = %input.job_id,
            count = parsed.professionals.len(),
            trade = %input.scope.trade,
            "directory search returned"
        );

        Ok(CandidateList::new(input.job_id, parsed.professionals))
    }

    async fn health_check(&self) -> Result<(), StageError> {
        let request = self.client.get(self.endpoint("health")).send();
        let response = timeout(self.timeout, request)
            .await
            .map_err(|_| StageError::timeout(SERVICE, self.timeout))?
            .map_err(|e| StageError::transport(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(StageError::transport(
                SERVICE,
                format!("health endpoint returned HTTP {}", response.status()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let dir = HttpDirectory::new("http://localhost:3000/", Duration::from_secs(5));
        assert_eq!(
            dir.endpoint("professionals/search"),
            "http://localhost:3000/professionals/search"
        );

        let no_slash = HttpDirectory::new("http://localhost:3000", Duration::from_secs(5));
        assert_eq!(no_slash.endpoint("health"), "http://localhost:3000/health");
    }

    #[test]
    fn test_empty_response_parses() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"professionals": []}"#).unwrap();
        assert!(parsed.professionals.is_empty());

        let missing: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.professionals.is_empty());
    }
}

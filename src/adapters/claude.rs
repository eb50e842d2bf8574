//! Shared Anthropic Messages API client for the AI-backed capabilities.
//!
//! Intake and ranking both prompt a model and slice a JSON payload out
//! of its free-text reply; this client owns the HTTP plumbing and the
//! slicing so the adapters only deal with their own prompts and schemas.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;

use super::StageError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Minimal Messages API client
#[derive(Clone)]
pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single-turn prompt and return the model's text reply.
    pub async fn complete(
        &self,
        service: &str,
        prompt: &str,
        max_tokens: u32,
        call_timeout: Duration,
    ) -> Result<String, StageError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        let response = timeout(call_timeout, request)
            .await
            .map_err(|_| StageError::timeout(service, call_timeout))?
            .map_err(|e| StageError::transport(service, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::transport(
                service,
                format!("HTTP {}: {}", status, detail.trim()),
            ));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| StageError::bad_response(service, e))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(StageError::bad_response(service, "empty model reply"));
        }

        Ok(text)
    }
}

/// Slice the first JSON object out of a free-text model reply.
pub fn extract_json_object(reply: &str) -> Option<Value> {
    extract_delimited(reply, '{', '}')
}

/// Slice the first JSON array out of a free-text model reply.
pub fn extract_json_array(reply: &str) -> Option<Value> {
    extract_delimited(reply, '[', ']')
}

fn extract_delimited(reply: &str, open: char, close: char) -> Option<Value> {
    let start = reply.find(open)?;
    let end = reply.rfind(close)?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_object_from_prose() {
        let reply = "Sure, here is the analysis:\n{\"trade\": \"Plumbing\"}\nHope that helps!";
        let value = extract_json_object(reply).unwrap();
        assert_eq!(value["trade"], "Plumbing");
    }

    #[test]
    fn test_extract_array_from_prose() {
        let reply = "Ranked:\n[{\"score\": 95}, {\"score\": 80}]";
        let value = extract_json_array(reply).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_array("[ not valid json }").is_none());
    }
}

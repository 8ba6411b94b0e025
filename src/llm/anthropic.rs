//! Anthropic Messages API client.
//! Pooled reqwest client; retries 429 (Retry-After or 1s/2s/4s, max 3),
//! 5xx with backoff (max 2) and one timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CompletionRequest, LanguageModel};
use crate::error::{IveeError, Result};

const API_VERSION: &str = "2023-06-01";

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    cancel: CancellationToken,
}

impl AnthropicClient {
    /// `cancel` aborts retry backoff on shutdown.
    pub fn new(api_key: impl Into<String>, cancel: CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(45))
            .build()
            .map_err(|e| IveeError::Inference(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            cancel,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn backoff(&self, wait: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = self.cancel.cancelled() => Err(IveeError::Cancelled("inference")),
        }
    }

    async fn send_with_retry(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        let max_429_retries: u32 = 3;
        let max_5xx_retries: u32 = 2;
        let mut timeout_retried = false;

        loop {
            let result = self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt >= max_429_retries {
                        return Err(IveeError::Inference("rate limited".into()));
                    }
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| Duration::from_secs(1 << attempt));
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "429 rate limited, retrying");
                    self.backoff(wait).await?;
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= max_5xx_retries {
                        return Err(IveeError::Inference(format!("server error: {}", resp.status())));
                    }
                    let wait = Duration::from_millis(500 * (1 << attempt));
                    warn!(
                        attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    self.backoff(wait).await?;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(IveeError::Inference(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(IveeError::Inference("request timed out".into()));
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => return Err(IveeError::Inference(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(IveeError::Inference("Anthropic API key not configured".into()));
        }
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        debug!(model = %request.model, turns = request.messages.len(), "sending completion");

        let response = self.send_with_retry(&body).await?;
        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| IveeError::Inference(format!("malformed response: {e}")))?;
        first_text(parsed)
    }
}

fn first_text(response: MessagesResponse) -> Result<String> {
    response
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| IveeError::Inference("response carried no text".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_text_block() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"id":"msg_1","content":[{"type":"text","text":"You are coding."}],"role":"assistant"}"#,
        )
        .unwrap();
        assert_eq!(first_text(parsed).unwrap(), "You are coding.");
    }

    #[test]
    fn empty_content_is_inference_error() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(first_text(parsed), Err(IveeError::Inference(_))));
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let client = AnthropicClient::new("", CancellationToken::new()).unwrap();
        let err = client
            .complete(CompletionRequest {
                model: "m".into(),
                max_tokens: 10,
                messages: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IveeError::Inference(_)));
    }
}

//! Decision-service client: one logical request per chat instruction, with
//! bounded exponential backoff on the distinguished transient failure.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Boundary for a single completion attempt against the decision service.
pub trait DecisionEndpoint: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// Distinguished transient failure: the upstream reported itself unavailable.
///
/// Only this kind is retried; anything else propagates immediately so that
/// programming errors and permanent rejections are never masked as transient.
#[derive(Debug)]
pub struct UpstreamUnavailable {
    pub detail: String,
}

impl fmt::Display for UpstreamUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decision service unavailable: {}", self.detail)
    }
}

impl std::error::Error for UpstreamUnavailable {}

/// Surfaced after the retry budget is spent. Fatal for the turn, not the process.
#[derive(Debug)]
pub struct UpstreamExhausted {
    pub attempts: u32,
    pub last: String,
}

impl fmt::Display for UpstreamExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decision service retries exhausted after {} attempts: {}",
            self.attempts, self.last
        )
    }
}

impl std::error::Error for UpstreamExhausted {}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(1000),
        }
    }
}

pub struct DecisionClient {
    endpoint: Box<dyn DecisionEndpoint>,
    retry: RetryPolicy,
}

impl DecisionClient {
    pub fn new(endpoint: Box<dyn DecisionEndpoint>) -> Self {
        Self {
            endpoint,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends one logical request. On each transient failure: sleep the current
    /// backoff, double it, retry; after `max_attempts` failures, fail with
    /// [`UpstreamExhausted`] carrying the last observed error.
    pub async fn send(&self, prompt: &str) -> anyhow::Result<String> {
        let mut attempt = 0u32;
        let mut delay = self.retry.base_backoff;
        let mut last = String::new();
        loop {
            if attempt >= self.retry.max_attempts {
                return Err(anyhow::Error::new(UpstreamExhausted {
                    attempts: attempt,
                    last,
                }));
            }
            match self.endpoint.complete(prompt).await {
                Ok(raw) => return Ok(strip_code_fence(&raw).to_string()),
                Err(err) if err.is::<UpstreamUnavailable>() => {
                    last = format!("{err:#}");
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "decision service unavailable, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Strips one wrapping Markdown code fence if present.
///
/// Models routinely wrap the reply JSON in ``` or ```json fences; this is
/// normalization, not parsing, so anything that is not a complete fence pair
/// passes through untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = body.strip_suffix("```") else {
        return trimmed;
    };
    // The opening fence may carry a language tag.
    let body = match body.split_once('\n') {
        Some((tag, rest)) if tag.chars().all(|c| c.is_ascii_alphanumeric()) => rest,
        _ => body,
    };
    body.trim()
}

/// Minimal config for an Ollama-style `POST /api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:11434/api/generate`.
    pub endpoint: String,
    pub model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct HttpEndpoint {
    cfg: EndpointConfig,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(cfg: EndpointConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

impl DecisionEndpoint for HttpEndpoint {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = GenerateRequest {
                model: self.cfg.model.clone(),
                prompt: prompt.to_string(),
                stream: false,
            };

            let res = self
                .client
                .post(&self.cfg.endpoint)
                .json(&request)
                .send()
                .await
                .context("decision request failed")?;

            if res.status() == StatusCode::SERVICE_UNAVAILABLE {
                return Err(anyhow::Error::new(UpstreamUnavailable {
                    detail: format!("http {}", res.status()),
                }));
            }

            let body = res
                .error_for_status()
                .context("decision non-2xx response")?
                .json::<GenerateResponse>()
                .await
                .context("decision response decode failed")?;

            Ok(body.response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    #[derive(Default)]
    struct FakeEndpoint {
        responses: Mutex<VecDeque<anyhow::Result<String>>>,
        calls: Mutex<u32>,
    }

    impl FakeEndpoint {
        fn push_ok(&self, raw: impl Into<String>) {
            self.responses.lock().unwrap().push_back(Ok(raw.into()));
        }

        fn push_unavailable(&self) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(anyhow::Error::new(UpstreamUnavailable {
                    detail: "http 503".to_string(),
                })));
        }

        fn push_err(&self, msg: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(anyhow::anyhow!("{msg}")));
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl DecisionEndpoint for &FakeEndpoint {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                *self.calls.lock().unwrap() += 1;
                self.responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| anyhow::bail!("no response queued"))
            })
        }
    }

    fn client(endpoint: &'static FakeEndpoint) -> DecisionClient {
        DecisionClient::new(Box::new(endpoint)).with_retry(RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
        })
    }

    fn leak_endpoint() -> &'static FakeEndpoint {
        Box::leak(Box::new(FakeEndpoint::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_then_success_backs_off_geometrically() {
        let endpoint = leak_endpoint();
        for _ in 0..3 {
            endpoint.push_unavailable();
        }
        endpoint.push_ok("hello");

        let started = Instant::now();
        let got = client(endpoint).send("prompt").await.unwrap();

        assert_eq!(got, "hello");
        assert_eq!(endpoint.calls(), 4);
        // Slept 1s, 2s, 4s between the four attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_after_attempt_budget() {
        let endpoint = leak_endpoint();
        for _ in 0..6 {
            endpoint.push_unavailable();
        }

        let started = Instant::now();
        let err = client(endpoint).send("prompt").await.unwrap_err();

        let exhausted = err.downcast_ref::<UpstreamExhausted>().expect("exhausted");
        assert_eq!(exhausted.attempts, 5);
        assert!(exhausted.last.contains("unavailable"));
        assert_eq!(endpoint.calls(), 5);
        // Total backoff is base * (1 + 2 + 4 + 8 + 16).
        assert_eq!(started.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_propagates_without_retry() {
        let endpoint = leak_endpoint();
        endpoint.push_err("model not found");
        endpoint.push_ok("never reached");

        let started = Instant::now();
        let err = client(endpoint).send("prompt").await.unwrap_err();

        assert!(format!("{err:#}").contains("model not found"));
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn send_strips_reply_fence() {
        let endpoint = leak_endpoint();
        endpoint.push_ok("```json\n{\"conversation\":\"hi\",\"commands\":[]}\n```");

        let got = client(endpoint).send("prompt").await.unwrap();
        assert_eq!(got, "{\"conversation\":\"hi\",\"commands\":[]}");
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```json\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn unterminated_fence_passes_through() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }
}

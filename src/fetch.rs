use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION, USER_AGENT};
use url::Url;

const MAX_REDIRECT_HOPS: usize = 8;
const FAILURE_NOTE_LIMIT: usize = 120;

/// A completed HTTP retrieval, after redirects were followed.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Status of the last response in the chain.
    pub status: u16,
    pub final_url: String,
    pub content_type: String,
    pub body: String,
    /// Number of redirect hops taken before the final response.
    pub redirects: usize,
}

/// Transport-level failure (timeout, DNS, connection reset, TLS). A tagged
/// value, never an exception across the worker boundary: callers classify it
/// as a broken link or an error row and move on.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: String,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: truncate_note(&message.into(), FAILURE_NOTE_LIMIT),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_decode() {
            "decode"
        } else if err.is_redirect() {
            "redirect"
        } else {
            "request"
        };
        Self::new(kind, err.to_string())
    }

    /// Diagnostic used in error and violation rows: `<kind>: <message>`.
    pub fn note(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

pub fn truncate_note(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect()
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}

/// Per-worker HTTP fetcher. Each worker owns its own client so connection
/// keep-alive never contends across workers. Redirects are followed manually
/// so the chain length is known for the result note.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchFailure> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchFailure::from_reqwest(&e))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        let mut current = url.to_string();
        let mut hops = 0usize;

        loop {
            let response = self
                .client
                .get(&current)
                .header(USER_AGENT, &self.user_agent)
                .send()
                .await
                .map_err(|e| FetchFailure::from_reqwest(&e))?;

            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            if (300..400).contains(&status)
                && hops < MAX_REDIRECT_HOPS
                && let Some(target) = location
            {
                let next = match Url::parse(&current).and_then(|base| base.join(&target)) {
                    Ok(resolved) => resolved.to_string(),
                    Err(_) => target,
                };
                hops += 1;
                current = next;
                continue;
            }

            let final_url = response.url().to_string();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let body = response
                .text()
                .await
                .map_err(|e| FetchFailure::from_reqwest(&e))?;

            return Ok(FetchedPage {
                status,
                final_url,
                content_type,
                body,
                redirects: hops,
            });
        }
    }
}

/// Stand-in used when a worker's HTTP client cannot be built; every fetch
/// reports the construction failure so the affected URLs become error rows
/// instead of aborting the run.
pub struct FailingFetcher {
    failure: FetchFailure,
}

impl FailingFetcher {
    pub fn new(failure: FetchFailure) -> Self {
        Self { failure }
    }
}

#[async_trait::async_trait]
impl Fetcher for FailingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedPage, FetchFailure> {
        Err(self.failure.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_is_truncated_to_120_chars() {
        let long = "x".repeat(400);
        let failure = FetchFailure::new("timeout", long);
        assert_eq!(failure.message.chars().count(), 120);
        assert!(failure.note().starts_with("timeout: "));
    }

    #[test]
    fn short_messages_pass_through() {
        let failure = FetchFailure::new("connect", "connection refused");
        assert_eq!(failure.note(), "connect: connection refused");
    }

    #[tokio::test]
    async fn failing_fetcher_always_errors() {
        let fetcher = FailingFetcher::new(FetchFailure::new("client", "build failed"));
        let err = fetcher.fetch("https://example.edu/a").await.unwrap_err();
        assert_eq!(err.kind, "client");
    }
}

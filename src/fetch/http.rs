use super::{ByteStream, FetchError, Fetcher, Result};
use crate::config::HttpConfig;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// reqwest-backed fetcher with timeouts and bounded retry for page fetches
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
        })
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await.map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn get_text_once(&self, url: &str) -> Result<String> {
        let body = self
            .send(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::RequestFailed(format!("Failed to read body: {}", e)))?;

        debug!(url, size = body.len(), "Page fetched");
        Ok(body)
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff after the given failed attempt: 1s, 2s, 4s, ... capped at 30s
fn backoff_delay(attempt: u32) -> Duration {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map(Duration::from_secs)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.get_text_once(url).await {
                Ok(body) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Fetch succeeded after retry");
                    }
                    return Ok(body);
                }
                // Retrying a malformed URL cannot help
                Err(e @ FetchError::InvalidUrl(_)) => return Err(e),
                Err(e) if attempts >= self.max_retries => {
                    warn!(url, attempts, error = %e, "Fetch failed after retries");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url, attempts, error = %e, "Fetch failed, retrying");

                    tokio::time::sleep(backoff_delay(attempts)).await;
                }
            }
        }
    }

    async fn open_stream(&self, url: &str) -> Result<ByteStream> {
        let response = self.send(url).await?;
        debug!(url, length = ?response.content_length(), "Resource opened");

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::other(e.to_string()));
        Ok(Box::pin(stream))
    }
}

//! HTTP collaborator used by both worker kinds
//!
//! Listing pages are read whole through [`Fetcher::get_text`]; resources are
//! streamed through [`Fetcher::open_stream`] so large images never sit in
//! memory.

mod http;

pub use http::HttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Response body as a stream of chunks
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page body as text
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Open a resource for streamed reading
    async fn open_stream(&self, url: &str) -> Result<ByteStream>;
}

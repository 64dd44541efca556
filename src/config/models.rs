use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool topology and lifecycle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of download workers
    #[serde(default = "default_worker_num")]
    pub worker_num: usize,
    /// Idle ceiling: consecutive empty polls before a download worker exits
    #[serde(default = "default_max_idle_polls")]
    pub max_idle_polls: u32,
    /// Sleep between empty polls
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    #[serde(default)]
    pub daemonize: bool,
}

impl PoolConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_num: default_worker_num(),
            max_idle_polls: default_max_idle_polls(),
            idle_interval_ms: default_idle_interval_ms(),
            daemonize: false,
        }
    }
}

fn default_worker_num() -> usize {
    3
}

fn default_max_idle_polls() -> u32 {
    60
}

fn default_idle_interval_ms() -> u64 {
    1000
}

/// Local storage for downloaded files
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Copy buffer size for streamed downloads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("wallpaper")
}

fn default_chunk_size() -> ByteSize {
    ByteSize::kib(8)
}

/// Queue backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Shared set on a Redis server
    #[default]
    Redis,
    /// Embedded persistent set, one process at a time
    Fjall,
    /// Process-local set, gone when the process exits
    Memory,
}

/// Work queue identity and backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// Set key shared by the extraction and download workers
    #[serde(default = "default_queue_key")]
    pub key: String,
    /// Server URL for the redis backend
    #[serde(default = "default_queue_url")]
    pub url: String,
    /// Keyspace directory for the fjall backend
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            key: default_queue_key(),
            url: default_queue_url(),
            path: default_queue_path(),
        }
    }
}

fn default_queue_key() -> String {
    "wallpaper_url_queue".to_string()
}

fn default_queue_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

/// Paginated listing the extraction worker crawls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Listing URL template, `{page}` is replaced by the 1-based page number
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_capture_group")]
    pub capture_group: usize,
    /// Match count that marks the repeated last page of the listing; 0 disables it
    #[serde(default = "default_repeat_sentinel")]
    pub repeat_sentinel: Option<usize>,
    /// Hard stop after this many pages
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl SourceConfig {
    pub fn page_url(&self, page: u32) -> String {
        self.listing_url.replace("{page}", &page.to_string())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            pattern: default_pattern(),
            capture_group: default_capture_group(),
            repeat_sentinel: default_repeat_sentinel(),
            max_pages: None,
        }
    }
}

fn default_listing_url() -> String {
    "https://bing.ioliu.cn/?p={page}".to_string()
}

fn default_pattern() -> String {
    r#"<img([^>]*)\ssrc="([^\s>]+)""#.to_string()
}

fn default_capture_group() -> usize {
    2
}

/// The default listing serves a three-image page once it runs out
fn default_repeat_sentinel() -> Option<usize> {
    Some(3)
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts per listing page fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("imgpool/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Append logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

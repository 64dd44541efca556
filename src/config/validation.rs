use super::models::{Config, QueueBackend};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("pool.worker_num must be at least 1")]
    NoDownloadWorkers,

    #[error("pool.max_idle_polls must be at least 1")]
    ZeroIdleCeiling,

    #[error("storage.chunk_size must be positive")]
    ZeroChunkSize,

    #[error("queue.key must not be empty")]
    EmptyQueueKey,

    #[error("queue.path must be set for the fjall backend")]
    MissingQueuePath,

    #[error("queue.url '{0}' is not a redis:// or rediss:// URL")]
    InvalidQueueUrl(String),

    #[error("source.listing_url '{0}' has no {{page}} placeholder")]
    MissingPagePlaceholder(String),

    #[error("source.pattern does not compile: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("source.pattern has {groups} capture groups, capture_group = {requested}")]
    MissingCaptureGroup { groups: usize, requested: usize },

    #[error("http.max_retries must be at least 1")]
    ZeroRetries,

    #[error("http.max_retries is {0}, the limit is 10")]
    TooManyRetries(u32),
}

pub const MAX_RETRIES: u32 = 10;

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_pool(config)?;
    validate_storage(config)?;
    validate_queue(config)?;
    validate_source(config)?;
    validate_http(config)?;
    Ok(())
}

fn validate_pool(config: &Config) -> Result<(), ValidationError> {
    if config.pool.worker_num == 0 {
        return Err(ValidationError::NoDownloadWorkers);
    }
    if config.pool.max_idle_polls == 0 {
        return Err(ValidationError::ZeroIdleCeiling);
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.chunk_size.as_u64() == 0 {
        return Err(ValidationError::ZeroChunkSize);
    }
    Ok(())
}

fn validate_queue(config: &Config) -> Result<(), ValidationError> {
    if config.queue.key.is_empty() {
        return Err(ValidationError::EmptyQueueKey);
    }
    match config.queue.backend {
        QueueBackend::Fjall if config.queue.path.as_os_str().is_empty() => {
            return Err(ValidationError::MissingQueuePath);
        }
        QueueBackend::Redis => {
            let scheme_ok = url::Url::parse(&config.queue.url)
                .is_ok_and(|url| matches!(url.scheme(), "redis" | "rediss"));
            if !scheme_ok {
                return Err(ValidationError::InvalidQueueUrl(config.queue.url.clone()));
            }
        }
        _ => {}
    }
    Ok(())
}

/// The pattern is compiled here once so a bad regex fails at startup, not in the worker
fn validate_source(config: &Config) -> Result<(), ValidationError> {
    let source = &config.source;
    if !source.listing_url.contains("{page}") {
        return Err(ValidationError::MissingPagePlaceholder(
            source.listing_url.clone(),
        ));
    }

    let regex = Regex::new(&source.pattern)?;
    // captures_len counts the implicit whole-match group 0
    let groups = regex.captures_len() - 1;
    if source.capture_group > groups {
        return Err(ValidationError::MissingCaptureGroup {
            groups,
            requested: source.capture_group,
        });
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.max_retries == 0 {
        return Err(ValidationError::ZeroRetries);
    }
    if config.http.max_retries > MAX_RETRIES {
        return Err(ValidationError::TooManyRetries(config.http.max_retries));
    }
    Ok(())
}

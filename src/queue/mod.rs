//! Shared work queue between the extraction worker and the download workers
//!
//! The queue is a set keyed by name: adding a member that is already present
//! is a no-op, and a pop removes and returns one member atomically. Workers
//! only ever talk to each other through this trait.

mod memory;
mod redis_set;
mod store;

pub use memory::MemoryQueue;
pub use redis_set::RedisQueue;
pub use store::FjallQueue;

use crate::config::{QueueBackend, QueueConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored member is not valid UTF-8")]
    InvalidMember,
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Set-like store used as the single channel between workers
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Add members to the set at `key`, returning how many were not already present
    async fn add_members(&self, key: &str, items: &[String]) -> Result<usize>;

    /// Remove and return one member, or `None` if the set is empty
    async fn pop_random_member(&self, key: &str) -> Result<Option<String>>;

    /// Number of members currently in the set
    async fn len(&self, key: &str) -> Result<usize>;

    async fn is_empty(&self, key: &str) -> Result<bool> {
        Ok(self.len(key).await? == 0)
    }

    /// Make prior writes durable; a no-op for volatile backends
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the queue backend selected in configuration
pub async fn connect(config: &QueueConfig) -> Result<Arc<dyn WorkQueue>> {
    match config.backend {
        QueueBackend::Redis => Ok(Arc::new(RedisQueue::connect(&config.url).await?)),
        QueueBackend::Fjall => Ok(Arc::new(FjallQueue::open(&config.path)?)),
        QueueBackend::Memory => {
            info!(key = %config.key, "Using in-memory work queue");
            Ok(Arc::new(MemoryQueue::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = QueueConfig {
            backend: QueueBackend::Memory,
            ..QueueConfig::default()
        };
        let queue = connect(&config).await.unwrap();
        assert!(queue.is_empty("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_fjall_backend() {
        let temp_dir = TempDir::new().unwrap();
        let config = QueueConfig {
            backend: QueueBackend::Fjall,
            path: temp_dir.path().join("queue"),
            ..QueueConfig::default()
        };

        let queue = connect(&config).await.unwrap();
        queue
            .add_members(&config.key, &["http://x/a.jpg".to_string()])
            .await
            .unwrap();
        assert_eq!(queue.len(&config.key).await.unwrap(), 1);
    }
}

use super::{Result, WorkQueue};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info};

/// Queue sets kept in a Redis server
///
/// Uses `SADD`, `SPOP` and `SCARD` directly, so any number of processes
/// pointed at the same server and key share one queue. `SPOP` is atomic on
/// the server, which is all the download workers need.
pub struct RedisQueue {
    conn: MultiplexedConnection,
}

impl RedisQueue {
    /// Connect to `url`, e.g. `redis://127.0.0.1:6379`
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "Connecting to Redis work queue");
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn add_members(&self, key: &str, items: &[String]) -> Result<usize> {
        // SADD without members is a syntax error
        if items.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("SADD");
        cmd.arg(key);
        for item in items {
            cmd.arg(item.as_str());
        }
        let inserted: usize = cmd.query_async(&mut self.conn.clone()).await?;

        debug!(key, inserted, "Members added");
        Ok(inserted)
    }

    async fn pop_random_member(&self, key: &str) -> Result<Option<String>> {
        let member: Option<String> = redis::cmd("SPOP")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(member)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let len: usize = redis::cmd("SCARD")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(len)
    }
}

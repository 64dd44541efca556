use super::{QueueError, Result, WorkQueue};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

const MEMBER_SEPARATOR: u8 = 0;

/// FjallQueue persists queue sets in a Fjall embedded keyspace
///
/// Architecture:
/// - `members` partition: `{queue_key}\0{member}` → empty value
///
/// Every set lives under its own key prefix, so a prefix scan enumerates one
/// set. Members survive restarts, which lets URLs be seeded ahead of a run
/// and leaves failed items in place if the pool is stopped.
///
/// Pops take the first member in key order rather than a random one. Any
/// member is an acceptable answer to a pop; only atomicity matters, and the
/// write lock makes scan-then-remove atomic for every worker in the process.
pub struct FjallQueue {
    keyspace: Keyspace,
    members: PartitionHandle,
    write_lock: Mutex<()>,
}

impl FjallQueue {
    /// Open or create a FjallQueue at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening FjallQueue at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let members = keyspace.open_partition("members", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            members,
            write_lock: Mutex::new(()),
        })
    }
}

fn set_prefix(key: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(key.len() + 1);
    prefix.extend_from_slice(key.as_bytes());
    prefix.push(MEMBER_SEPARATOR);
    prefix
}

fn member_key(key: &str, member: &str) -> Vec<u8> {
    let mut encoded = set_prefix(key);
    encoded.extend_from_slice(member.as_bytes());
    encoded
}

#[async_trait]
impl WorkQueue for FjallQueue {
    async fn add_members(&self, key: &str, items: &[String]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut inserted = 0;
        for item in items {
            let encoded = member_key(key, item);
            if !self.members.contains_key(&encoded)? {
                self.members.insert(encoded, Vec::<u8>::new())?;
                inserted += 1;
            }
        }

        debug!(key, inserted, "Members persisted");
        Ok(inserted)
    }

    async fn pop_random_member(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.write_lock.lock().await;

        let prefix = set_prefix(key);
        let Some(entry) = self.members.prefix(&prefix).next() else {
            return Ok(None);
        };
        let (encoded, _) = entry?;

        self.members.remove(encoded.clone())?;

        let member = std::str::from_utf8(&encoded[prefix.len()..])
            .map_err(|_| QueueError::InvalidMember)?
            .to_string();
        Ok(Some(member))
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let mut count = 0;
        for entry in self.members.prefix(set_prefix(key)) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    async fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

use super::{Result, WorkQueue};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

/// In-process set store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryQueue {
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn add_members(&self, key: &str, items: &[String]) -> Result<usize> {
        let mut sets = self.sets.lock().await;
        let set = sets.entry(key.to_string()).or_default();

        let inserted = items
            .iter()
            .filter(|item| set.insert((*item).clone()))
            .count();

        debug!(key, inserted, total = set.len(), "Members added");
        Ok(inserted)
    }

    async fn pop_random_member(&self, key: &str) -> Result<Option<String>> {
        let mut sets = self.sets.lock().await;
        let Some(set) = sets.get_mut(key) else {
            return Ok(None);
        };
        if set.is_empty() {
            return Ok(None);
        }

        let index = rand::thread_rng().gen_range(0..set.len());
        let member = set.iter().nth(index).cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let sets = self.sets.lock().await;
        Ok(sets.get(key).map_or(0, HashSet::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let queue = MemoryQueue::new();

        let inserted = queue
            .add_members("k", &urls(&["a.jpg", "b.jpg", "a.jpg"]))
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let inserted = queue.add_members("k", &urls(&["b.jpg"])).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(queue.len("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pop_drains_set() {
        let queue = MemoryQueue::new();
        queue
            .add_members("k", &urls(&["a.jpg", "b.jpg", "c.jpg"]))
            .await
            .unwrap();

        let mut popped = Vec::new();
        while let Some(url) = queue.pop_random_member("k").await.unwrap() {
            popped.push(url);
        }
        popped.sort();

        assert_eq!(popped, urls(&["a.jpg", "b.jpg", "c.jpg"]));
        assert!(queue.is_empty("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let queue = MemoryQueue::new();
        queue.add_members("one", &urls(&["a.jpg"])).await.unwrap();

        assert_eq!(queue.pop_random_member("two").await.unwrap(), None);
        assert_eq!(queue.len("one").await.unwrap(), 1);
    }
}

//! In-memory waiting queue and active flags.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::matching::WaitingEntry;
use crate::ports::{ActiveFlags, WaitingQueue};

fn unavailable(failing: &AtomicBool) -> Result<(), DomainError> {
    if failing.load(Ordering::SeqCst) {
        return Err(DomainError::new(
            ErrorCode::CacheError,
            "Simulated matching backend failure",
        ));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    /// Enqueue sequence → identity; iteration order is scan order.
    order: BTreeMap<u64, UserId>,
    entries: HashMap<UserId, (u64, WaitingEntry)>,
}

/// Waiting queue held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWaitingQueue {
    state: Arc<RwLock<QueueState>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryWaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `CacheError`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl QueueState {
    fn take(&mut self, user: &UserId) -> bool {
        match self.entries.remove(user) {
            Some((seq, _)) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl WaitingQueue for InMemoryWaitingQueue {
    async fn upsert(&self, entry: WaitingEntry) -> Result<(), DomainError> {
        unavailable(&self.failing)?;
        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;

        let user = entry.user_id.clone();
        if let Some((old_seq, _)) = state.entries.insert(user.clone(), (seq, entry)) {
            state.order.remove(&old_seq);
        }
        state.order.insert(seq, user);
        Ok(())
    }

    async fn remove(&self, user: &UserId) -> Result<bool, DomainError> {
        unavailable(&self.failing)?;
        Ok(self.state.write().await.take(user))
    }

    async fn remove_pair(&self, a: &UserId, b: &UserId) -> Result<(), DomainError> {
        unavailable(&self.failing)?;
        let mut state = self.state.write().await;
        state.take(a);
        state.take(b);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<WaitingEntry>, DomainError> {
        unavailable(&self.failing)?;
        let state = self.state.read().await;
        Ok(state
            .order
            .values()
            .filter_map(|user| state.entries.get(user).map(|(_, e)| e.clone()))
            .collect())
    }

    async fn contains(&self, user: &UserId) -> Result<bool, DomainError> {
        unavailable(&self.failing)?;
        Ok(self.state.read().await.entries.contains_key(user))
    }

    async fn len(&self) -> Result<usize, DomainError> {
        unavailable(&self.failing)?;
        Ok(self.state.read().await.entries.len())
    }
}

/// Active-session flags held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActiveFlags {
    active: Arc<RwLock<HashSet<UserId>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryActiveFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `CacheError`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActiveFlags for InMemoryActiveFlags {
    async fn is_active(&self, user: &UserId) -> Result<bool, DomainError> {
        unavailable(&self.failing)?;
        Ok(self.active.read().await.contains(user))
    }

    async fn claim_pair(&self, a: &UserId, b: &UserId) -> Result<bool, DomainError> {
        unavailable(&self.failing)?;
        let mut active = self.active.write().await;
        if a == b || active.contains(a) || active.contains(b) {
            return Ok(false);
        }
        active.insert(a.clone());
        active.insert(b.clone());
        Ok(true)
    }

    async fn clear_active(&self, user: &UserId) -> Result<bool, DomainError> {
        unavailable(&self.failing)?;
        Ok(self.active.write().await.remove(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::InterestSet;

    fn entry(id: &str, interests: &[&str]) -> WaitingEntry {
        WaitingEntry::new(UserId::new(id).unwrap(), InterestSet::from_raw(interests))
    }

    fn ids(entries: &[WaitingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.user_id.as_str()).collect()
    }

    #[tokio::test]
    async fn entries_come_back_in_enqueue_order() {
        let queue = InMemoryWaitingQueue::new();
        queue.upsert(entry("a", &["x"])).await.unwrap();
        queue.upsert(entry("b", &["x"])).await.unwrap();
        queue.upsert(entry("c", &["x"])).await.unwrap();

        let entries = queue.entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn upsert_replaces_and_moves_to_back() {
        let queue = InMemoryWaitingQueue::new();
        queue.upsert(entry("a", &["x"])).await.unwrap();
        queue.upsert(entry("b", &["x"])).await.unwrap();
        queue.upsert(entry("a", &["y"])).await.unwrap();

        let entries = queue.entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["b", "a"]);
        assert!(entries[1].interests.contains("y"));
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = InMemoryWaitingQueue::new();
        let user = UserId::new("a").unwrap();
        queue.upsert(entry("a", &["x"])).await.unwrap();

        assert!(queue.remove(&user).await.unwrap());
        assert!(!queue.remove(&user).await.unwrap());
        assert!(!queue.contains(&user).await.unwrap());
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_pair_takes_both_entries() {
        let queue = InMemoryWaitingQueue::new();
        queue.upsert(entry("a", &["x"])).await.unwrap();
        queue.upsert(entry("b", &["x"])).await.unwrap();
        queue.upsert(entry("c", &["x"])).await.unwrap();

        let (a, b) = (UserId::new("a").unwrap(), UserId::new("b").unwrap());
        queue.remove_pair(&a, &b).await.unwrap();

        assert_eq!(ids(&queue.entries().await.unwrap()), vec!["c"]);
    }

    #[tokio::test]
    async fn failing_queue_changes_nothing() {
        let queue = InMemoryWaitingQueue::new();
        queue.upsert(entry("a", &["x"])).await.unwrap();
        queue.set_failing(true);

        let a = UserId::new("a").unwrap();
        let b = UserId::new("b").unwrap();
        assert!(queue.remove_pair(&a, &b).await.is_err());
        assert!(queue.upsert(entry("b", &["x"])).await.is_err());

        queue.set_failing(false);
        assert_eq!(ids(&queue.entries().await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn flags_claim_and_clear() {
        let flags = InMemoryActiveFlags::new();
        let a = UserId::new("a").unwrap();
        let b = UserId::new("b").unwrap();

        assert!(!flags.is_active(&a).await.unwrap());
        assert!(flags.claim_pair(&a, &b).await.unwrap());
        assert!(flags.is_active(&a).await.unwrap());
        assert!(flags.is_active(&b).await.unwrap());
        assert!(flags.clear_active(&a).await.unwrap());
        assert!(!flags.clear_active(&a).await.unwrap());
    }

    #[tokio::test]
    async fn claim_fails_whole_when_either_is_taken() {
        let flags = InMemoryActiveFlags::new();
        let a = UserId::new("a").unwrap();
        let b = UserId::new("b").unwrap();
        let c = UserId::new("c").unwrap();

        assert!(flags.claim_pair(&a, &b).await.unwrap());
        assert!(!flags.claim_pair(&c, &b).await.unwrap());
        // The losing claim left `c` untouched.
        assert!(!flags.is_active(&c).await.unwrap());
        assert!(!flags.claim_pair(&c, &c).await.unwrap());
    }
}

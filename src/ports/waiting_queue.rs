//! Waiting queue and active-flag ports.
//!
//! The pairing decision hinges on two calls that must each be atomic in the
//! backend: `ActiveFlags::claim_pair`, which is the point where a pair is
//! taken, and `WaitingQueue::remove_pair`. Everything else only needs
//! per-call consistency.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::matching::WaitingEntry;

/// Identities waiting for a partner, scanned in enqueue order.
#[async_trait]
pub trait WaitingQueue: Send + Sync {
    /// Inserts the entry, replacing any existing entry for the same identity.
    ///
    /// A replaced entry moves to the back of the scan order.
    async fn upsert(&self, entry: WaitingEntry) -> Result<(), DomainError>;

    /// Removes the identity's entry. Returns false if there was none.
    async fn remove(&self, user: &UserId) -> Result<bool, DomainError>;

    /// Removes both entries in one step. On error neither entry was removed.
    async fn remove_pair(&self, a: &UserId, b: &UserId) -> Result<(), DomainError>;

    /// All entries, oldest first.
    async fn entries(&self) -> Result<Vec<WaitingEntry>, DomainError>;

    async fn contains(&self, user: &UserId) -> Result<bool, DomainError>;

    async fn len(&self) -> Result<usize, DomainError>;
}

/// Marks identities that are currently in a live session.
#[async_trait]
pub trait ActiveFlags: Send + Sync {
    async fn is_active(&self, user: &UserId) -> Result<bool, DomainError>;

    /// Flags both identities if neither is flagged yet.
    ///
    /// Returns false, changing nothing, when either one already is. Two
    /// callers racing for an overlapping pair cannot both succeed.
    async fn claim_pair(&self, a: &UserId, b: &UserId) -> Result<bool, DomainError>;

    /// Clears the flag. Returns false if it was not set.
    async fn clear_active(&self, user: &UserId) -> Result<bool, DomainError>;
}

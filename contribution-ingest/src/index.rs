//! Dedup index collaborator.
//!
//! The index is expected to live outside the process and be shared by many
//! pipeline instances, so atomicity is part of the trait contract rather
//! than an in-process lock: [`DedupIndex::insert`] must fail with
//! [`IndexError::Conflict`] when the fingerprint is already present.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::IndexError;
use crate::fingerprint::Fingerprint;
use crate::outcome::AcceptedContribution;

/// Persistence boundary for accepted contributions, keyed by fingerprint.
#[async_trait]
pub trait DedupIndex: Send + Sync {
    /// Whether a fingerprint has been indexed.
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError>;

    /// Atomically index an accepted contribution.
    ///
    /// Returns `Conflict` if the fingerprint is already present. Two
    /// concurrent inserts of the same fingerprint must not both succeed.
    async fn insert(
        &self,
        fingerprint: Fingerprint,
        contribution: AcceptedContribution,
    ) -> Result<(), IndexError>;
}

/// Process-local index backed by a sharded concurrent map.
///
/// Useful for tests and single-node deployments.
pub struct InMemoryDedupIndex {
    entries: DashMap<Fingerprint, AcceptedContribution>,
}

impl InMemoryDedupIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Fetch an indexed contribution.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<AcceptedContribution> {
        self.entries.get(fingerprint).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryDedupIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupIndex for InMemoryDedupIndex {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError> {
        Ok(self.entries.contains_key(fingerprint))
    }

    async fn insert(
        &self,
        fingerprint: Fingerprint,
        contribution: AcceptedContribution,
    ) -> Result<(), IndexError> {
        // The entry guard holds the shard lock across check and insert
        match self.entries.entry(fingerprint) {
            Entry::Occupied(_) => Err(IndexError::Conflict(fingerprint)),
            Entry::Vacant(slot) => {
                slot.insert(contribution);
                debug!(fingerprint = %fingerprint, "Dedup index: inserted");
                Ok(())
            }
        }
    }
}

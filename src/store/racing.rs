//! A [`MemoryStore`] that forces concurrent writers onto the same version.

use super::{DocumentStore, MemoryStore, Versioned};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Barrier;
use uuid::Uuid;

/// Once armed, the next `parties` fetches from `collection` each wait until
/// all of them have read, so every racer starts from the same version.
pub(crate) struct RacingStore {
    inner: MemoryStore,
    collection: &'static str,
    barrier: Barrier,
    parties: usize,
    armed: AtomicUsize,
    lost_swaps: AtomicUsize,
    fail_key_release: AtomicBool,
}

impl RacingStore {
    pub(crate) fn new(collection: &'static str, parties: usize) -> RacingStore {
        RacingStore {
            inner: MemoryStore::default(),
            collection,
            barrier: Barrier::new(parties),
            parties,
            armed: AtomicUsize::new(0),
            lost_swaps: AtomicUsize::new(0),
            fail_key_release: AtomicBool::new(false),
        }
    }

    pub(crate) fn arm(&self) {
        self.armed.store(self.parties, Ordering::SeqCst);
    }

    /// Compare-and-swaps rejected because another writer got there first.
    pub(crate) fn lost_swaps(&self) -> usize {
        self.lost_swaps.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_key_release(&self) {
        self.fail_key_release.store(true, Ordering::SeqCst);
    }

    fn take_slot(&self) -> bool {
        self.armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn fetch(&self, collection: &'static str, id: Uuid) -> anyhow::Result<Option<Versioned>> {
        let doc = self.inner.fetch(collection, id).await?;
        if collection == self.collection && self.take_slot() {
            self.barrier.wait().await;
        }
        Ok(doc)
    }

    async fn fetch_all(&self, collection: &'static str) -> anyhow::Result<Vec<Versioned>> {
        self.inner.fetch_all(collection).await
    }

    async fn insert(&self, collection: &'static str, id: Uuid, body: Value) -> anyhow::Result<()> {
        self.inner.insert(collection, id, body).await
    }

    async fn compare_and_swap(
        &self,
        collection: &'static str,
        id: Uuid,
        expected: i64,
        body: Value,
    ) -> anyhow::Result<bool> {
        let swapped = self.inner.compare_and_swap(collection, id, expected, body).await?;
        if !swapped {
            self.lost_swaps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(swapped)
    }

    async fn remove(&self, collection: &'static str, id: Uuid) -> anyhow::Result<bool> {
        self.inner.remove(collection, id).await
    }

    async fn reserve_key(&self, namespace: &'static str, key: &str, owner: Uuid) -> anyhow::Result<bool> {
        self.inner.reserve_key(namespace, key, owner).await
    }

    async fn release_key(&self, namespace: &'static str, key: &str) -> anyhow::Result<()> {
        if self.fail_key_release.load(Ordering::SeqCst) {
            anyhow::bail!("key store unavailable");
        }
        self.inner.release_key(namespace, key).await
    }

    async fn key_owner(&self, namespace: &'static str, key: &str) -> anyhow::Result<Option<Uuid>> {
        self.inner.key_owner(namespace, key).await
    }

    async fn next_in_sequence(&self, name: &str) -> anyhow::Result<i64> {
        self.inner.next_in_sequence(name).await
    }
}

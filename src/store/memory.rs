use super::{DocumentStore, Versioned};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{hash_map::Entry, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Process-local store with the same guarantees as the database backend.
/// Everything is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<(&'static str, Uuid), Versioned>,
    keys: HashMap<(&'static str, String), Uuid>,
    counters: HashMap<String, i64>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, collection: &'static str, id: Uuid) -> anyhow::Result<Option<Versioned>> {
        Ok(self.inner.lock().await.docs.get(&(collection, id)).cloned())
    }

    async fn fetch_all(&self, collection: &'static str) -> anyhow::Result<Vec<Versioned>> {
        Ok(self
            .inner
            .lock()
            .await
            .docs
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn insert(&self, collection: &'static str, id: Uuid, body: Value) -> anyhow::Result<()> {
        match self.inner.lock().await.docs.entry((collection, id)) {
            Entry::Occupied(_) => anyhow::bail!("duplicate id {id} in {collection}"),
            Entry::Vacant(slot) => {
                slot.insert(Versioned { version: 1, body });
                Ok(())
            }
        }
    }

    async fn compare_and_swap(
        &self,
        collection: &'static str,
        id: Uuid,
        expected: i64,
        body: Value,
    ) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.docs.get_mut(&(collection, id)) {
            Some(doc) if doc.version == expected => {
                doc.version += 1;
                doc.body = body;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, collection: &'static str, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.inner.lock().await.docs.remove(&(collection, id)).is_some())
    }

    async fn reserve_key(&self, namespace: &'static str, key: &str, owner: Uuid) -> anyhow::Result<bool> {
        match self.inner.lock().await.keys.entry((namespace, key.to_string())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(true)
            }
        }
    }

    async fn release_key(&self, namespace: &'static str, key: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .keys
            .remove(&(namespace, key.to_string()));
        Ok(())
    }

    async fn key_owner(&self, namespace: &'static str, key: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .await
            .keys
            .get(&(namespace, key.to_string()))
            .copied())
    }

    async fn next_in_sequence(&self, name: &str) -> anyhow::Result<i64> {
        let mut inner = self.inner.lock().await;
        let counter = inner.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

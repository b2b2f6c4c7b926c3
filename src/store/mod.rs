//! Document persistence.
//!
//! [`DocumentStore`] is the raw, object safe contract a backend implements:
//! JSON bodies addressed by `(collection, id)` carrying a version number that
//! every successful write bumps. [`Store`] is the typed layer the services
//! use; its [`Store::modify`] is the only way a stored document changes.

use crate::error::{AppError, AppResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod pg;
#[cfg(test)]
mod racing;

pub use memory::MemoryStore;
pub use pg::PgStore;
#[cfg(test)]
pub(crate) use racing::RacingStore;

/// Attempts [`Store::modify`] makes before giving up on a contended document.
const MAX_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
pub struct Versioned {
    pub version: i64,
    pub body: Value,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, collection: &'static str, id: Uuid) -> anyhow::Result<Option<Versioned>>;

    async fn fetch_all(&self, collection: &'static str) -> anyhow::Result<Vec<Versioned>>;

    async fn insert(&self, collection: &'static str, id: Uuid, body: Value) -> anyhow::Result<()>;

    /// Replaces the body only if the stored version still equals `expected`.
    /// Returns `false` when another write got there first.
    async fn compare_and_swap(
        &self,
        collection: &'static str,
        id: Uuid,
        expected: i64,
        body: Value,
    ) -> anyhow::Result<bool>;

    async fn remove(&self, collection: &'static str, id: Uuid) -> anyhow::Result<bool>;

    /// Claims `key` within `namespace` for `owner`. Returns `false` if the key
    /// is already held.
    async fn reserve_key(&self, namespace: &'static str, key: &str, owner: Uuid) -> anyhow::Result<bool>;

    async fn release_key(&self, namespace: &'static str, key: &str) -> anyhow::Result<()>;

    async fn key_owner(&self, namespace: &'static str, key: &str) -> anyhow::Result<Option<Uuid>>;

    /// Atomically increments and returns the named counter, starting at 1.
    async fn next_in_sequence(&self, name: &str) -> anyhow::Result<i64>;
}

pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Name used in not-found errors.
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    fn touch(&mut self, at: DateTime<Utc>);
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn DocumentStore>,
}

impl Store {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Store {
        Store { inner }
    }

    pub fn memory() -> Store {
        Store::new(Arc::new(MemoryStore::default()))
    }

    pub async fn find<T: Document>(&self, id: Uuid) -> AppResult<Option<T>> {
        match self.inner.fetch(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(decode(doc.body)?)),
            None => Ok(None),
        }
    }

    pub async fn get<T: Document>(&self, id: Uuid) -> AppResult<T> {
        self.find(id).await?.ok_or(AppError::NotFound(T::KIND))
    }

    pub async fn all<T: Document>(&self) -> AppResult<Vec<T>> {
        self.inner
            .fetch_all(T::COLLECTION)
            .await?
            .into_iter()
            .map(|doc| decode(doc.body))
            .collect()
    }

    pub async fn create<T: Document>(&self, doc: &T) -> AppResult<()> {
        let body = serde_json::to_value(doc).context("failed to encode document")?;
        self.inner.insert(T::COLLECTION, doc.id(), body).await?;
        Ok(())
    }

    /// Optimistic read-modify-write. `change` runs against the freshest copy
    /// and may reject it; the result is written only if nobody else wrote in
    /// between, otherwise the whole step is retried.
    pub async fn modify<T, R, F>(&self, id: Uuid, mut change: F) -> AppResult<(T, R)>
    where
        T: Document,
        R: Send,
        F: FnMut(&mut T) -> AppResult<R> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self
                .inner
                .fetch(T::COLLECTION, id)
                .await?
                .ok_or(AppError::NotFound(T::KIND))?;
            let mut doc: T = decode(current.body)?;
            let outcome = change(&mut doc)?;
            doc.touch(Utc::now());

            let body = serde_json::to_value(&doc).context("failed to encode document")?;
            if self
                .inner
                .compare_and_swap(T::COLLECTION, id, current.version, body)
                .await?
            {
                return Ok((doc, outcome));
            }
            tracing::debug!(collection = T::COLLECTION, %id, attempt, "version conflict, retrying");
        }
        Err(anyhow::anyhow!("gave up writing {}/{} after {} attempts", T::COLLECTION, id, MAX_ATTEMPTS).into())
    }

    /// Returns the removed document, if there was one.
    pub async fn delete<T: Document>(&self, id: Uuid) -> AppResult<Option<T>> {
        let Some(doc) = self.find::<T>(id).await? else {
            return Ok(None);
        };
        if self.inner.remove(T::COLLECTION, id).await? {
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    pub async fn reserve_key(&self, namespace: &'static str, key: &str, owner: Uuid) -> AppResult<bool> {
        Ok(self.inner.reserve_key(namespace, key, owner).await?)
    }

    pub async fn release_key(&self, namespace: &'static str, key: &str) -> AppResult<()> {
        Ok(self.inner.release_key(namespace, key).await?)
    }

    pub async fn key_owner(&self, namespace: &'static str, key: &str) -> AppResult<Option<Uuid>> {
        Ok(self.inner.key_owner(namespace, key).await?)
    }

    pub async fn next_in_sequence(&self, name: &str) -> AppResult<i64> {
        Ok(self.inner.next_in_sequence(name).await?)
    }
}

fn decode<T: Document>(body: Value) -> AppResult<T> {
    Ok(serde_json::from_value(body)
        .with_context(|| format!("corrupt document in {}", T::COLLECTION))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Uuid,
        hits: u32,
        updated_at: DateTime<Utc>,
    }

    impl Document for Counter {
        const COLLECTION: &'static str = "counters";
        const KIND: &'static str = "Counter";

        fn id(&self) -> Uuid {
            self.id
        }

        fn touch(&mut self, at: DateTime<Utc>) {
            self.updated_at = at;
        }
    }

    async fn seeded() -> (Store, Uuid) {
        let store = Store::memory();
        let counter = Counter {
            id: Uuid::new_v4(),
            hits: 0,
            updated_at: Utc::now(),
        };
        store.create(&counter).await.unwrap();
        (store, counter.id)
    }

    #[tokio::test]
    async fn concurrent_modifications_are_not_lost() {
        let racing = Arc::new(RacingStore::new(Counter::COLLECTION, 8));
        let store = Store::new(racing.clone());
        let id = Uuid::new_v4();
        store
            .create(&Counter {
                id,
                hits: 0,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        racing.arm();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .modify::<Counter, _, _>(id, |c| {
                            c.hits += 1;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get::<Counter>(id).await.unwrap().hits, 8);
        // all eight read the same version, so seven writes had to retry
        assert!(racing.lost_swaps() >= 7);
    }

    #[tokio::test]
    async fn rejected_change_is_not_written() {
        let (store, id) = seeded().await;
        let err = store
            .modify::<Counter, (), _>(id, |c| {
                c.hits = 99;
                Err(AppError::conflict("no"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get::<Counter>(id).await.unwrap().hits, 0);
    }

    #[tokio::test]
    async fn missing_documents() {
        let store = Store::memory();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get::<Counter>(id).await,
            Err(AppError::NotFound("Counter"))
        ));
        assert!(store.delete::<Counter>(id).await.unwrap().is_none());
    }
}

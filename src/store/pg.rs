use super::{DocumentStore, Versioned};
use crate::{schema::*, DbPool};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::Value;
use uuid::Uuid;

/// Postgres backend. Every document is one JSONB row keyed by
/// `(collection, id)`; the version column guards concurrent writers.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> PgStore {
        PgStore { pool }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn fetch(&self, collection: &'static str, id: Uuid) -> anyhow::Result<Option<Versioned>> {
        let conn = &mut self.pool.get().await?;

        let row = documents::table
            .filter(documents::collection.eq(collection))
            .filter(documents::id.eq(id))
            .select((documents::version, documents::body))
            .first::<(i64, Value)>(conn)
            .await
            .optional()?;

        Ok(row.map(|(version, body)| Versioned { version, body }))
    }

    async fn fetch_all(&self, collection: &'static str) -> anyhow::Result<Vec<Versioned>> {
        let conn = &mut self.pool.get().await?;

        Ok(documents::table
            .filter(documents::collection.eq(collection))
            .select((documents::version, documents::body))
            .load::<(i64, Value)>(conn)
            .await?
            .into_iter()
            .map(|(version, body)| Versioned { version, body })
            .collect())
    }

    async fn insert(&self, collection: &'static str, id: Uuid, body: Value) -> anyhow::Result<()> {
        let conn = &mut self.pool.get().await?;

        diesel::insert_into(documents::table)
            .values((
                documents::collection.eq(collection),
                documents::id.eq(id),
                documents::version.eq(1i64),
                documents::body.eq(body),
            ))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        collection: &'static str,
        id: Uuid,
        expected: i64,
        body: Value,
    ) -> anyhow::Result<bool> {
        let conn = &mut self.pool.get().await?;

        let updated = diesel::update(
            documents::table
                .filter(documents::collection.eq(collection))
                .filter(documents::id.eq(id))
                .filter(documents::version.eq(expected)),
        )
        .set((
            documents::version.eq(expected + 1),
            documents::body.eq(body),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    async fn remove(&self, collection: &'static str, id: Uuid) -> anyhow::Result<bool> {
        let conn = &mut self.pool.get().await?;

        let deleted = diesel::delete(
            documents::table
                .filter(documents::collection.eq(collection))
                .filter(documents::id.eq(id)),
        )
        .execute(conn)
        .await?;

        Ok(deleted == 1)
    }

    async fn reserve_key(&self, namespace: &'static str, key: &str, owner: Uuid) -> anyhow::Result<bool> {
        let conn = &mut self.pool.get().await?;

        let inserted = diesel::insert_into(unique_keys::table)
            .values((
                unique_keys::namespace.eq(namespace),
                unique_keys::key.eq(key),
                unique_keys::owner.eq(owner),
            ))
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }

    async fn release_key(&self, namespace: &'static str, key: &str) -> anyhow::Result<()> {
        let conn = &mut self.pool.get().await?;

        diesel::delete(
            unique_keys::table
                .filter(unique_keys::namespace.eq(namespace))
                .filter(unique_keys::key.eq(key)),
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn key_owner(&self, namespace: &'static str, key: &str) -> anyhow::Result<Option<Uuid>> {
        let conn = &mut self.pool.get().await?;

        Ok(unique_keys::table
            .filter(unique_keys::namespace.eq(namespace))
            .filter(unique_keys::key.eq(key))
            .select(unique_keys::owner)
            .first::<Uuid>(conn)
            .await
            .optional()?)
    }

    async fn next_in_sequence(&self, name: &str) -> anyhow::Result<i64> {
        let conn = &mut self.pool.get().await?;

        Ok(diesel::insert_into(sequences::table)
            .values((sequences::name.eq(name), sequences::value.eq(1i64)))
            .on_conflict(sequences::name)
            .do_update()
            .set(sequences::value.eq(sequences::value + 1i64))
            .returning(sequences::value)
            .get_result::<i64>(conn)
            .await?)
    }
}

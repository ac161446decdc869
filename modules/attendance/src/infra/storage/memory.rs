use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::domain::store::{DocumentStore, Filter};

/// Process-local store. Each collection is a vector behind a DashMap entry, so
/// every operation on one collection runs under that entry's write lock.
#[derive(Default)]
pub struct InMemoryStore {
    collections: DashMap<String, Vec<Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> anyhow::Result<Vec<Value>> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|d| filter.matches(d))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<()> {
        self.collections
            .entry(collection.to_owned())
            .or_default()
            .extend(docs);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Value,
    ) -> anyhow::Result<bool> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn replace_where(
        &self,
        collection: &str,
        filter: &Filter,
        docs: Vec<Value>,
    ) -> anyhow::Result<u64> {
        let mut slot = self.collections.entry(collection.to_owned()).or_default();
        let before = slot.len();
        slot.retain(|d| !filter.matches(d));
        let removed = (before - slot.len()) as u64;
        slot.extend(docs);
        Ok(removed)
    }
}

//! Storage port: a document store addressed by collection name, plus a typed
//! view over it per document shape.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::contract::model::Document;
use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { field: String, value: Value },
    /// Inclusive on both ends.
    Between { field: String, lo: Value, hi: Value },
}

/// Conjunction of field conditions over top-level document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn between(
        mut self,
        field: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition::Between {
            field: field.into(),
            lo: lo.into(),
            hi: hi.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|cond| match cond {
            Condition::Eq { field, value } => doc.get(field) == Some(value),
            Condition::Between { field, lo, hi } => match doc.get(field) {
                Some(v) => {
                    matches!(compare(lo, v), Some(Ordering::Less | Ordering::Equal))
                        && matches!(compare(v, hi), Some(Ordering::Less | Ordering::Equal))
                }
                None => false,
            },
        })
    }
}

/// Strings compare lexically (ISO-8601 days sort correctly), numbers numerically.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

/// Raw document store. Documents keep insertion order within a collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// At most `limit` matches, oldest first. `usize::MAX` means no limit.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> anyhow::Result<Vec<Value>>;

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<()>;

    /// Replace the first matching document. Returns false when nothing matched.
    async fn update_one(&self, collection: &str, filter: &Filter, doc: Value)
        -> anyhow::Result<bool>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64>;

    /// Atomically remove every match and insert `docs`. Returns the number removed.
    async fn replace_where(
        &self,
        collection: &str,
        filter: &Filter,
        docs: Vec<Value>,
    ) -> anyhow::Result<u64>;
}

/// Typed handle on one collection.
pub struct Collection<D> {
    store: Arc<dyn DocumentStore>,
    _doc: PhantomData<fn() -> D>,
}

impl<D> Clone for Collection<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _doc: PhantomData,
        }
    }
}

impl<D: Document> Collection<D> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _doc: PhantomData,
        }
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<D>, DomainError> {
        self.fetch(filter, usize::MAX).await
    }

    pub async fn find_limited(&self, filter: &Filter, limit: usize) -> Result<Vec<D>, DomainError> {
        self.fetch(filter, limit).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<D>, DomainError> {
        Ok(self.fetch(filter, 1).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<D>, DomainError> {
        self.find_one(&Filter::all().eq("id", id)).await
    }

    pub async fn insert(&self, doc: &D) -> Result<(), DomainError> {
        self.insert_many(std::slice::from_ref(doc)).await
    }

    pub async fn insert_many(&self, docs: &[D]) -> Result<(), DomainError> {
        if docs.is_empty() {
            return Ok(());
        }
        let values = encode_all(docs)?;
        self.store
            .insert_many(D::COLLECTION, values)
            .await
            .map_err(storage_error)
    }

    pub async fn replace_by_id(&self, doc: &D) -> Result<bool, DomainError> {
        let value = encode(doc)?;
        self.store
            .update_one(D::COLLECTION, &Filter::all().eq("id", doc.id()), value)
            .await
            .map_err(storage_error)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool, DomainError> {
        let removed = self
            .store
            .delete_many(D::COLLECTION, &Filter::all().eq("id", id))
            .await
            .map_err(storage_error)?;
        Ok(removed > 0)
    }

    pub async fn replace_where(&self, filter: &Filter, docs: &[D]) -> Result<u64, DomainError> {
        let values = encode_all(docs)?;
        self.store
            .replace_where(D::COLLECTION, filter, values)
            .await
            .map_err(storage_error)
    }

    async fn fetch(&self, filter: &Filter, limit: usize) -> Result<Vec<D>, DomainError> {
        let raw = self
            .store
            .find(D::COLLECTION, filter, limit)
            .await
            .map_err(storage_error)?;
        raw.into_iter()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| {
                    DomainError::database(format!("corrupt document in '{}': {e}", D::COLLECTION))
                })
            })
            .collect()
    }
}

fn encode<D: Document>(doc: &D) -> Result<Value, DomainError> {
    serde_json::to_value(doc).map_err(|e| DomainError::internal(e.to_string()))
}

fn encode_all<D: Document>(docs: &[D]) -> Result<Vec<Value>, DomainError> {
    docs.iter().map(encode).collect()
}

fn storage_error(e: anyhow::Error) -> DomainError {
    DomainError::database(format!("{e:#}"))
}

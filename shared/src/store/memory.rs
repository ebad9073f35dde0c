use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    counter_value, merge_into, Collection, Document, DocumentSnapshot, DocumentStore, Result,
    StoreError, WriteMode,
};

type Collections = HashMap<Collection, BTreeMap<String, Document>>;

/// Process-local store. Used as the cache of [`super::LocalFirstStore`] and on its own when no
/// remote database is configured.
#[derive(Default)]
pub struct InMemoryStore(RwLock<Collections>);

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached collection with a fresh snapshot.
    pub async fn replace_collection(&self, collection: Collection, docs: &[DocumentSnapshot]) {
        let fresh = docs
            .iter()
            .map(|s| (s.id.clone(), s.data.clone()))
            .collect::<BTreeMap<_, _>>();
        self.0.write().await.insert(collection, fresh);
    }

    /// Replace the cached documents matching `field == value` with a fresh snapshot.
    pub async fn replace_matching(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
        docs: &[DocumentSnapshot],
    ) {
        let mut guard = self.0.write().await;
        let entries = guard.entry(collection).or_default();
        entries.retain(|_, doc| doc.get(field) != Some(value));
        for snapshot in docs {
            entries.insert(snapshot.id.clone(), snapshot.data.clone());
        }
    }

    /// Every cached document, grouped by collection.
    pub async fn snapshot(&self) -> Vec<(Collection, Vec<DocumentSnapshot>)> {
        let guard = self.0.read().await;
        let mut out = guard
            .iter()
            .map(|(collection, entries)| {
                let docs = entries
                    .iter()
                    .map(|(id, data)| DocumentSnapshot {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect();
                (*collection, docs)
            })
            .collect::<Vec<_>>();
        out.sort_by_key(|(collection, _)| *collection);
        out
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let guard = self.0.read().await;
        Ok(guard.get(&collection).and_then(|c| c.get(id)).cloned())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<DocumentSnapshot>> {
        let guard = self.0.read().await;
        Ok(guard
            .get(&collection)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(id, data)| DocumentSnapshot {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<DocumentSnapshot>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .filter(|s| s.data.get(field) == Some(value))
            .collect())
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        doc: Document,
        mode: WriteMode,
    ) -> Result<()> {
        let mut guard = self.0.write().await;
        let entries = guard.entry(collection).or_default();
        match (mode, entries.get_mut(id)) {
            (WriteMode::Merge, Some(existing)) => merge_into(existing, doc),
            _ => {
                entries.insert(id.to_string(), doc);
            }
        }
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document> {
        let mut guard = self.0.write().await;
        let existing = guard
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(id))
            .ok_or(StoreError::NotFound)?;
        merge_into(existing, patch);
        Ok(existing.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut guard = self.0.write().await;
        if let Some(entries) = guard.get_mut(&collection) {
            entries.remove(id);
        }
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64> {
        let mut guard = self.0.write().await;
        let existing = guard
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(id))
            .ok_or(StoreError::NotFound)?;
        let next = (counter_value(existing.get(field)) + delta).max(0);
        existing.insert(field.to_string(), Value::from(next));
        Ok(next)
    }
}

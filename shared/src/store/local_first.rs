use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{
    Collection, Document, DocumentSnapshot, DocumentStore, InMemoryStore, Result, StoreError,
    WriteMode,
};

/// Writes land in the process cache first, then go to the remote store. Remote failures are
/// logged and absorbed, so the cache stays authoritative for the lifetime of the process.
/// Successful remote reads refresh the cache.
pub struct LocalFirstStore {
    local: InMemoryStore,
    remote: Option<Arc<dyn DocumentStore>>,
}

#[derive(Debug, Default, Serialize)]
pub struct FlushReport {
    pub collections: Vec<FlushedCollection>,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct FlushedCollection {
    pub collection: &'static str,
    pub pushed: usize,
}

impl LocalFirstStore {
    pub fn new(remote: Option<Arc<dyn DocumentStore>>) -> Self {
        Self {
            local: InMemoryStore::new(),
            remote,
        }
    }

    /// Cache-only store, for deployments without a database.
    pub fn local_only() -> Self {
        Self::new(None)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Push every cached document to the remote store with merge semantics.
    pub async fn flush(&self) -> Result<FlushReport> {
        let Some(remote) = &self.remote else {
            return Err(StoreError::Backend("no remote store configured".into()));
        };

        let mut report = FlushReport::default();
        for (collection, docs) in self.local.snapshot().await {
            let mut pushed = 0;
            for snapshot in docs {
                match remote
                    .set(collection, &snapshot.id, snapshot.data, WriteMode::Merge)
                    .await
                {
                    Ok(()) => pushed += 1,
                    Err(e) => {
                        tracing::warn!("flush of {}/{} failed: {}", collection, snapshot.id, e);
                        report.failed += 1;
                    }
                }
            }
            tracing::info!("Flushed {} documents to {}", pushed, collection);
            report.collections.push(FlushedCollection {
                collection: collection.as_str(),
                pushed,
            });
        }
        Ok(report)
    }
}

#[async_trait]
impl DocumentStore for LocalFirstStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        if let Some(remote) = &self.remote {
            match remote.get(collection, id).await {
                Ok(Some(doc)) => {
                    self.local
                        .set(collection, id, doc.clone(), WriteMode::Replace)
                        .await?;
                    return Ok(Some(doc));
                }
                Ok(None) => {
                    self.local.delete(collection, id).await?;
                    return Ok(None);
                }
                Err(e) => tracing::warn!("remote get {}/{} failed, serving cache: {}", collection, id, e),
            }
        }
        self.local.get(collection, id).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<DocumentSnapshot>> {
        if let Some(remote) = &self.remote {
            match remote.list(collection).await {
                Ok(docs) => {
                    self.local.replace_collection(collection, &docs).await;
                    return Ok(docs);
                }
                Err(e) => tracing::warn!("remote list {} failed, serving cache: {}", collection, e),
            }
        }
        self.local.list(collection).await
    }

    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<DocumentSnapshot>> {
        if let Some(remote) = &self.remote {
            match remote.find_by(collection, field, value).await {
                Ok(docs) => {
                    self.local
                        .replace_matching(collection, field, value, &docs)
                        .await;
                    return Ok(docs);
                }
                Err(e) => tracing::warn!(
                    "remote query {} where {} failed, serving cache: {}",
                    collection,
                    field,
                    e
                ),
            }
        }
        self.local.find_by(collection, field, value).await
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        doc: Document,
        mode: WriteMode,
    ) -> Result<()> {
        self.local.set(collection, id, doc.clone(), mode).await?;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(collection, id, doc, mode).await {
                tracing::warn!("remote write {}/{} failed, kept locally: {}", collection, id, e);
            }
        }
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document> {
        // A document missing from the cache is created from `{id} + patch`.
        let mut seeded = patch.clone();
        if self.local.get(collection, id).await?.is_none() {
            seeded
                .entry("id")
                .or_insert_with(|| Value::String(id.to_string()));
        }
        self.local
            .set(collection, id, seeded, WriteMode::Merge)
            .await?;
        let merged = self
            .local
            .get(collection, id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let Some(remote) = &self.remote else {
            return Ok(merged);
        };

        match remote.update(collection, id, patch).await {
            Ok(doc) => {
                self.local
                    .set(collection, id, doc.clone(), WriteMode::Replace)
                    .await?;
                Ok(doc)
            }
            Err(StoreError::NotFound) => {
                if let Err(e) = remote
                    .set(collection, id, merged.clone(), WriteMode::Merge)
                    .await
                {
                    tracing::warn!("remote merge {}/{} failed, kept locally: {}", collection, id, e);
                }
                Ok(merged)
            }
            Err(e) => {
                tracing::warn!("remote update {}/{} failed, kept locally: {}", collection, id, e);
                Ok(merged)
            }
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.local.delete(collection, id).await?;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(collection, id).await {
                tracing::warn!("remote delete {}/{} failed: {}", collection, id, e);
            }
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
        let local = self.local.increment(collection, id, field, delta).await;
        let Some(remote) = &self.remote else {
            return local;
        };

        match remote.increment(collection, id, field, delta).await {
            Ok(value) => {
                if local.is_ok() {
                    let mut patch = Document::new();
                    patch.insert(field.to_string(), Value::from(value));
                    self.local.update(collection, id, patch).await?;
                }
                Ok(value)
            }
            Err(e) => {
                if !matches!(e, StoreError::NotFound) {
                    tracing::warn!("remote increment {}/{} failed: {}", collection, id, e);
                }
                local
            }
        }
    }

    async fn delete_where(&self, collection: Collection, field: &str, value: &Value) -> Result<usize> {
        let cached = self.local.delete_where(collection, field, value).await?;
        let Some(remote) = &self.remote else {
            return Ok(cached);
        };
        match remote.delete_where(collection, field, value).await {
            Ok(removed) => Ok(removed.max(cached)),
            Err(e) => {
                tracing::warn!("remote delete {} where {} failed: {}", collection, field, e);
                Ok(cached)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn get(&self, _: Collection, _: &str) -> Result<Option<Document>> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn list(&self, _: Collection) -> Result<Vec<DocumentSnapshot>> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn find_by(&self, _: Collection, _: &str, _: &Value) -> Result<Vec<DocumentSnapshot>> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn set(&self, _: Collection, _: &str, _: Document, _: WriteMode) -> Result<()> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn update(&self, _: Collection, _: &str, _: Document) -> Result<Document> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn delete(&self, _: Collection, _: &str) -> Result<()> {
            Err(StoreError::Backend("offline".into()))
        }
        async fn increment(&self, _: Collection, _: &str, _: &str, _: i64) -> Result<i64> {
            Err(StoreError::Backend("offline".into()))
        }
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn writes_survive_a_failing_remote() {
        let store = LocalFirstStore::new(Some(Arc::new(FailingStore)));
        store
            .set(Collection::Announcements, "a1", doc(json!({"text": "hi"})), WriteMode::Replace)
            .await
            .unwrap();

        let listed = store.list(Collection::Announcements).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].data["text"], "hi");

        let updated = store
            .update(Collection::Announcements, "a1", doc(json!({"date": "2024-01-01"})))
            .await
            .unwrap();
        assert_eq!(updated["text"], "hi");
        assert_eq!(updated["date"], "2024-01-01");
    }

    #[tokio::test]
    async fn reads_reflect_remote_and_refresh_cache() {
        let remote = Arc::new(InMemoryStore::new());
        remote
            .set(Collection::Courses, "c1", doc(json!({"name": "Remote"})), WriteMode::Replace)
            .await
            .unwrap();

        let store = LocalFirstStore::new(Some(remote.clone() as Arc<dyn DocumentStore>));
        store
            .local
            .set(Collection::Courses, "stale", doc(json!({"name": "Stale"})), WriteMode::Replace)
            .await
            .unwrap();

        let listed = store.list(Collection::Courses).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "c1");

        let cached = store.local.list(Collection::Courses).await.unwrap();
        assert_eq!(cached, listed);
    }

    #[tokio::test]
    async fn update_of_missing_remote_document_becomes_merge_set() {
        let remote = Arc::new(InMemoryStore::new());
        let store = LocalFirstStore::new(Some(remote.clone() as Arc<dyn DocumentStore>));

        let merged = store
            .update(Collection::ShowcaseProjects, "p1", doc(json!({"id": "p1", "name": "X"})))
            .await
            .unwrap();
        assert_eq!(merged["name"], "X");

        let pushed = remote.get(Collection::ShowcaseProjects, "p1").await.unwrap().unwrap();
        assert_eq!(pushed["name"], "X");
    }

    #[tokio::test]
    async fn remote_absence_evicts_the_cached_copy() {
        let remote = Arc::new(InMemoryStore::new());
        let store = LocalFirstStore::new(Some(remote.clone() as Arc<dyn DocumentStore>));
        store
            .set(Collection::ShowcaseProjects, "p1", doc(json!({"name": "P"})), WriteMode::Replace)
            .await
            .unwrap();

        // Deleted by another instance.
        remote.delete(Collection::ShowcaseProjects, "p1").await.unwrap();

        assert!(store.get(Collection::ShowcaseProjects, "p1").await.unwrap().is_none());
        assert!(store.local.get(Collection::ShowcaseProjects, "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_remote_get_still_serves_cache() {
        let store = LocalFirstStore::new(Some(Arc::new(FailingStore)));
        store
            .local
            .set(Collection::Courses, "c1", doc(json!({"name": "Cached"})), WriteMode::Replace)
            .await
            .unwrap();
        let cached = store.get(Collection::Courses, "c1").await.unwrap().unwrap();
        assert_eq!(cached["name"], "Cached");
    }

    #[tokio::test]
    async fn update_of_uncached_document_seeds_the_id() {
        let store = LocalFirstStore::new(Some(Arc::new(FailingStore)));
        let merged = store
            .update(Collection::Users, "a@oneorigin.us", doc(json!({"name": "A"})))
            .await
            .unwrap();
        assert_eq!(merged["id"], "a@oneorigin.us");
        assert_eq!(merged["name"], "A");

        let again = store
            .update(Collection::Users, "a@oneorigin.us", doc(json!({"name": "B"})))
            .await
            .unwrap();
        assert_eq!(again["id"], "a@oneorigin.us");
        assert_eq!(again["name"], "B");
    }

    #[tokio::test]
    async fn flush_pushes_cached_documents() {
        let remote = Arc::new(InMemoryStore::new());
        let store = LocalFirstStore::new(Some(remote.clone() as Arc<dyn DocumentStore>));
        store
            .local
            .set(Collection::Users, "a@oneorigin.us", doc(json!({"name": "A"})), WriteMode::Replace)
            .await
            .unwrap();

        let report = store.flush().await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.collections.len(), 1);
        assert_eq!(report.collections[0].collection, "users");
        assert_eq!(report.collections[0].pushed, 1);
        assert!(remote.get(Collection::Users, "a@oneorigin.us").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn flush_without_remote_is_an_error() {
        let store = LocalFirstStore::local_only();
        assert!(store.flush().await.is_err());
    }
}

//! Document store abstraction.
//!
//! Every entity is a JSON object keyed by id inside a named collection. The
//! DynamoDB implementation maps a collection to a partition (`PK`) and the
//! document id to the sort key (`SK`).

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod dynamo;
pub mod local_first;
pub mod memory;

pub use dynamo::DynamoStore;
pub use local_first::{FlushReport, LocalFirstStore};
pub use memory::InMemoryStore;

pub type Document = Map<String, Value>;
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Courses,
    Announcements,
    UserCourses,
    ShowcaseProjects,
    ShowcaseComments,
    ShowcaseSuggestions,
    ShowcaseUpvotes,
    QuickShorts,
    Config,
    WsConnections,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Users,
        Collection::Courses,
        Collection::Announcements,
        Collection::UserCourses,
        Collection::ShowcaseProjects,
        Collection::ShowcaseComments,
        Collection::ShowcaseSuggestions,
        Collection::ShowcaseUpvotes,
        Collection::QuickShorts,
        Collection::Config,
        Collection::WsConnections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Courses => "courses",
            Collection::Announcements => "announcements",
            Collection::UserCourses => "userCourses",
            Collection::ShowcaseProjects => "showcaseProjects",
            Collection::ShowcaseComments => "showcaseComments",
            Collection::ShowcaseSuggestions => "showcaseSuggestions",
            Collection::ShowcaseUpvotes => "showcaseUpvotes",
            Collection::QuickShorts => "quickShorts",
            Collection::Config => "config",
            Collection::WsConnections => "wsConnections",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `set` treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the whole document.
    Replace,
    /// Overwrite only the top-level fields present in the new document.
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    async fn list(&self, collection: Collection) -> Result<Vec<DocumentSnapshot>>;

    /// Documents whose top-level `field` equals `value`.
    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<DocumentSnapshot>>;

    async fn set(&self, collection: Collection, id: &str, doc: Document, mode: WriteMode)
        -> Result<()>;

    /// Patch an existing document and return the merged result.
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Add `delta` to a numeric field and return the new value. The result never drops below 0.
    async fn increment(&self, collection: Collection, id: &str, field: &str, delta: i64)
        -> Result<i64>;

    async fn delete_where(&self, collection: Collection, field: &str, value: &Value) -> Result<usize> {
        let matches = self.find_by(collection, field, value).await?;
        for snapshot in &matches {
            self.delete(collection, &snapshot.id).await?;
        }
        Ok(matches.len())
    }
}

/// Shallow merge: fields in `patch` overwrite fields in `base`.
pub fn merge_into(base: &mut Document, patch: Document) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Reads a counter leniently: numbers and numeric strings count, anything else is 0.
pub fn counter_value(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

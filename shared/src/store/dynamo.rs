use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client as DynamoClient;
use serde_json::{Number, Value};

use super::{
    counter_value, Collection, Document, DocumentSnapshot, DocumentStore, Result, StoreError,
    WriteMode,
};

const BATCH_LIMIT: usize = 25;
const MAX_BATCH_ATTEMPTS: u32 = 5;

/// Single-table DynamoDB store: `PK` = collection name, `SK` = document id, one attribute per
/// top-level JSON field.
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn key(collection: Collection, id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("PK".to_string(), AttributeValue::S(collection.as_str().to_string())),
            ("SK".to_string(), AttributeValue::S(id.to_string())),
        ])
    }

    async fn query(
        &self,
        collection: Collection,
        filter: Option<(&str, &Value)>,
    ) -> Result<Vec<DocumentSnapshot>> {
        let mut out = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut req = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(collection.as_str().to_string()))
                .set_exclusive_start_key(start_key.take());
            if let Some((field, value)) = filter {
                req = req
                    .filter_expression("#f = :v")
                    .expression_attribute_names("#f", field)
                    .expression_attribute_values(":v", json_to_attr(value));
            }

            let result = req.send().await.map_err(backend)?;
            for item in result.items() {
                if let Some(snapshot) = item_to_snapshot(item) {
                    out.push(snapshot);
                }
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(out)
    }

    async fn batch_delete(&self, collection: Collection, ids: &[String]) -> Result<()> {
        for chunk in ids.chunks(BATCH_LIMIT) {
            let mut requests = Vec::with_capacity(chunk.len());
            for id in chunk {
                let delete = DeleteRequest::builder()
                    .set_key(Some(Self::key(collection, id)))
                    .build()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                requests.push(WriteRequest::builder().delete_request(delete).build());
            }

            let mut attempts = 0;
            let mut unprocessed = Some(requests);
            while let Some(pending) = unprocessed.take() {
                attempts += 1;
                if attempts > MAX_BATCH_ATTEMPTS {
                    tracing::warn!(
                        "Giving up on {} unprocessed deletes in {}",
                        pending.len(),
                        collection
                    );
                    break;
                }

                let result = self
                    .client
                    .batch_write_item()
                    .request_items(&self.table_name, pending)
                    .send()
                    .await
                    .map_err(backend)?;

                unprocessed = result
                    .unprocessed_items()
                    .and_then(|items| items.get(&self.table_name))
                    .filter(|items| !items.is_empty())
                    .cloned();

                if let Some(retry) = &unprocessed {
                    tracing::info!(
                        "Retrying {} unprocessed deletes (attempt {})",
                        retry.len(),
                        attempts
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempts as u64))
                        .await;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(collection, id)))
            .send()
            .await
            .map_err(backend)?;

        Ok(result.item().map(item_to_document))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<DocumentSnapshot>> {
        self.query(collection, None).await
    }

    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<DocumentSnapshot>> {
        self.query(collection, Some((field, value))).await
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        doc: Document,
        mode: WriteMode,
    ) -> Result<()> {
        match mode {
            WriteMode::Replace => {
                let mut item = Self::key(collection, id);
                for (field, value) in &doc {
                    if field != "PK" && field != "SK" {
                        item.insert(field.clone(), json_to_attr(value));
                    }
                }
                self.client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(item))
                    .send()
                    .await
                    .map_err(backend)?;
            }
            WriteMode::Merge => {
                // UpdateItem creates the item when it does not exist yet.
                let (expression, names, values) = set_expression(&doc);
                self.client
                    .update_item()
                    .table_name(&self.table_name)
                    .set_key(Some(Self::key(collection, id)))
                    .set_update_expression(expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .send()
                    .await
                    .map_err(backend)?;
            }
        }
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document> {
        let (expression, names, values) = set_expression(&patch);
        let Some(expression) = expression else {
            return self.get(collection, id).await?.ok_or(StoreError::NotFound);
        };

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(collection, id)))
            .update_expression(expression)
            .condition_expression("attribute_exists(PK)")
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    StoreError::NotFound
                } else {
                    backend(e)
                }
            })?;

        Ok(result
            .attributes()
            .map(item_to_document)
            .unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(collection, id)))
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64> {
        let mut req = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(collection, id)))
            .update_expression("SET #count = if_not_exists(#count, :zero) + :delta")
            .expression_attribute_names("#count", field)
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .return_values(ReturnValue::UpdatedNew);

        req = if delta < 0 {
            req.condition_expression("#count >= :min")
                .expression_attribute_values(":min", AttributeValue::N((-delta).to_string()))
        } else {
            req.condition_expression("attribute_exists(PK)")
        };

        match req.send().await {
            Ok(result) => Ok(result
                .attributes()
                .and_then(|attrs| attrs.get(field))
                .map(|attr| counter_value(Some(&attr_to_json(attr))))
                .unwrap_or(0)),
            Err(e) => {
                let condition_failed = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if !condition_failed {
                    return Err(backend(e));
                }
                if delta >= 0 || self.get(collection, id).await?.is_none() {
                    return Err(StoreError::NotFound);
                }

                // Decrement would cross zero: clamp.
                let mut patch = Document::new();
                patch.insert(field.to_string(), Value::from(0));
                self.update(collection, id, patch).await?;
                Ok(0)
            }
        }
    }

    async fn delete_where(&self, collection: Collection, field: &str, value: &Value) -> Result<usize> {
        let ids = self
            .find_by(collection, field, value)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect::<Vec<_>>();
        self.batch_delete(collection, &ids).await?;
        tracing::info!("Deleted {} {} documents where {}", ids.len(), collection, field);
        Ok(ids.len())
    }
}

fn backend<E>(err: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

type Expression = (
    Option<String>,
    Option<HashMap<String, String>>,
    Option<HashMap<String, AttributeValue>>,
);

/// `SET #a0 = :v0, #a1 = :v1, ...` for every top-level field except the key attributes.
fn set_expression(doc: &Document) -> Expression {
    let mut clauses = Vec::new();
    let mut names = HashMap::new();
    let mut values = HashMap::new();

    for (i, (field, value)) in doc
        .iter()
        .filter(|(field, _)| field.as_str() != "PK" && field.as_str() != "SK")
        .enumerate()
    {
        clauses.push(format!("#a{i} = :v{i}"));
        names.insert(format!("#a{i}"), field.clone());
        values.insert(format!(":v{i}"), json_to_attr(value));
    }

    if clauses.is_empty() {
        return (None, None, None);
    }
    (
        Some(format!("SET {}", clauses.join(", "))),
        Some(names),
        Some(values),
    )
}

fn item_to_snapshot(item: &HashMap<String, AttributeValue>) -> Option<DocumentSnapshot> {
    let id = item.get("SK").and_then(|v| v.as_s().ok())?.clone();
    Some(DocumentSnapshot {
        id,
        data: item_to_document(item),
    })
}

fn item_to_document(item: &HashMap<String, AttributeValue>) -> Document {
    item.iter()
        .filter(|(field, _)| field.as_str() != "PK" && field.as_str() != "SK")
        .map(|(field, attr)| (field.clone(), attr_to_json(attr)))
        .collect()
}

pub fn json_to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attr(v)))
                .collect(),
        ),
    }
}

pub fn attr_to_json(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(attr_to_json).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attr_to_json(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(items.iter().map(|n| number_to_json(n)).collect()),
        _ => Value::Null,
    }
}

fn number_to_json(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::from(i);
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

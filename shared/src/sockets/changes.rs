//! Decoding of DynamoDB stream images into document changes.

use serde_json::{Map, Value};

use super::messages::ChangeKind;
use crate::store::{Collection, Document};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
    /// New image, or the old one for deletions.
    pub document: Document,
}

/// Unwraps one attribute in DynamoDB JSON (`{"S": "x"}`, `{"N": "1"}`, `{"M": {...}}`, ...).
pub fn decode_attribute(value: &Value) -> Value {
    let Some(map) = value.as_object().filter(|m| m.len() == 1) else {
        return value.clone();
    };
    let Some((tag, inner)) = map.iter().next() else {
        return Value::Null;
    };
    match tag.as_str() {
        "S" | "B" => inner.clone(),
        "N" => inner
            .as_str()
            .and_then(|n| {
                n.parse::<i64>()
                    .map(Value::from)
                    .ok()
                    .or_else(|| n.parse::<f64>().ok().map(Value::from))
            })
            .unwrap_or(Value::Null),
        "BOOL" => inner.clone(),
        "NULL" => Value::Null,
        "L" => Value::Array(
            inner
                .as_array()
                .map(|items| items.iter().map(decode_attribute).collect())
                .unwrap_or_default(),
        ),
        "M" => Value::Object(decode_image(inner)),
        "SS" | "NS" | "BS" => inner.clone(),
        _ => value.clone(),
    }
}

/// A whole item image as a plain JSON object.
pub fn decode_image(image: &Value) -> Map<String, Value> {
    image
        .as_object()
        .map(|attrs| {
            attrs
                .iter()
                .map(|(key, attr)| (key.clone(), decode_attribute(attr)))
                .collect()
        })
        .unwrap_or_default()
}

impl DocumentChange {
    /// `None` for unknown event names, unknown collections or images without keys.
    pub fn from_stream(event_name: &str, new_image: &Value, old_image: &Value) -> Option<Self> {
        let kind = ChangeKind::from_event_name(event_name)?;
        let raw = match kind {
            ChangeKind::Deleted => old_image,
            _ => new_image,
        };
        let mut document = decode_image(raw);
        let collection = document
            .remove("PK")
            .and_then(|pk| pk.as_str().and_then(Collection::parse))?;
        let id = document
            .remove("SK")
            .and_then(|sk| sk.as_str().map(str::to_string))?;
        Some(Self {
            collection,
            id,
            kind,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_nested_attributes() {
        let image = json!({
            "PK": {"S": "showcaseProjects"},
            "SK": {"S": "p-1"},
            "upvotes": {"N": "3"},
            "score": {"N": "1.5"},
            "tags": {"L": [{"S": "rust"}, {"S": "web"}]},
            "meta": {"M": {"ok": {"BOOL": true}, "none": {"NULL": true}}}
        });
        let change = DocumentChange::from_stream("INSERT", &image, &json!({})).unwrap();
        assert_eq!(change.collection, Collection::ShowcaseProjects);
        assert_eq!(change.id, "p-1");
        assert_eq!(change.kind, ChangeKind::Created);
        assert_eq!(
            Value::Object(change.document),
            json!({"upvotes": 3, "score": 1.5, "tags": ["rust", "web"], "meta": {"ok": true, "none": null}})
        );
    }

    #[test]
    fn removals_use_old_image() {
        let old = json!({"PK": {"S": "courses"}, "SK": {"S": "17"}, "name": {"S": "SQL"}});
        let change = DocumentChange::from_stream("REMOVE", &json!({}), &old).unwrap();
        assert_eq!(change.kind, ChangeKind::Deleted);
        assert_eq!(change.document["name"], "SQL");
    }

    #[test]
    fn unknown_records_are_skipped() {
        let image = json!({"PK": {"S": "CONNECTION#abc"}, "SK": {"S": "x"}});
        assert!(DocumentChange::from_stream("INSERT", &image, &json!({})).is_none());
        assert!(DocumentChange::from_stream("TTL", &image, &json!({})).is_none());
    }
}

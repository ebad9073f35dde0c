//! Lenient readers for showcase documents. Legacy and partially written documents are
//! coerced into complete entities on every read and write.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::store::{counter_value, Document};
use crate::types::{ShowcaseComment, ShowcaseProject, ShowcaseSuggestion};

pub const UNTITLED_PROJECT: &str = "Untitled Project";
pub const ANONYMOUS: &str = "Anonymous";

/// `{prefix}-{epochMs}-{random hex}`
pub fn new_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), &hex[..12])
}

pub fn now_iso() -> String {
    iso(Utc::now())
}

pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Trimmed string form of a scalar field; missing or non-scalar values become "".
pub fn text(doc: &Document, key: &str) -> String {
    match doc.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn text_or(doc: &Document, key: &str, fallback: &str) -> String {
    let value = text(doc, key);
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Parses RFC 3339 strings or epoch milliseconds.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
                .or_else(|| s.parse::<i64>().ok().and_then(from_millis))
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_millis),
        _ => None,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Normalized timestamp string; anything unparsable becomes now.
pub fn timestamp(value: Option<&Value>) -> String {
    iso(parse_timestamp(value).unwrap_or_else(Utc::now))
}

/// Milliseconds of a normalized timestamp string, 0 when unparsable.
pub fn timestamp_millis(raw: &str) -> i64 {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

fn counter(doc: &Document, key: &str) -> i64 {
    counter_value(doc.get(key)).max(0)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tags from a list or a comma-separated string.
pub fn tags(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    raw.iter()
        .map(|t| collapse_whitespace(t))
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn normalize_project(doc: &Document) -> ShowcaseProject {
    let id = text(doc, "id");
    ShowcaseProject {
        id: if id.is_empty() { new_id("p") } else { id },
        name: text_or(doc, "name", UNTITLED_PROJECT),
        tagline: text(doc, "tagline"),
        description: text(doc, "description"),
        demo_url: text(doc, "demoUrl"),
        demo_video_url: text(doc, "demoVideoUrl"),
        demo_video_storage_path: text(doc, "demoVideoStoragePath"),
        code_url: text(doc, "codeUrl"),
        code_snippet: text(doc, "codeSnippet"),
        image_url: text(doc, "imageUrl"),
        tags: tags(doc.get("tags")),
        maker_name: text_or(doc, "makerName", ANONYMOUS),
        maker_email: text(doc, "makerEmail"),
        maker_id: text(doc, "makerId"),
        created_at: timestamp(doc.get("createdAt")),
        upvotes: counter(doc, "upvotes"),
        comments_count: counter(doc, "commentsCount"),
        suggestions_count: counter(doc, "suggestionsCount"),
    }
}

pub fn normalize_comment(doc: &Document) -> ShowcaseComment {
    let id = text(doc, "id");
    let parent_id = text(doc, "parentId");
    ShowcaseComment {
        id: if id.is_empty() { new_id("c") } else { id },
        project_id: text(doc, "projectId"),
        parent_id: if parent_id.is_empty() { None } else { Some(parent_id) },
        author_name: text_or(doc, "authorName", ANONYMOUS),
        author_email: text(doc, "authorEmail"),
        author_id: text(doc, "authorId"),
        body: text(doc, "body"),
        created_at: timestamp(doc.get("createdAt")),
    }
}

pub fn normalize_suggestion(doc: &Document) -> ShowcaseSuggestion {
    let id = text(doc, "id");
    let to_name = text(doc, "toName");
    let to_name_lower = text(doc, "toNameLower");
    ShowcaseSuggestion {
        id: if id.is_empty() { new_id("s") } else { id },
        project_id: text(doc, "projectId"),
        project_name: text(doc, "projectName"),
        to_name_lower: if to_name_lower.is_empty() {
            to_name.to_lowercase()
        } else {
            to_name_lower
        },
        to_name,
        from_name: text_or(doc, "fromName", ANONYMOUS),
        from_email: text(doc, "fromEmail"),
        from_id: text(doc, "fromId"),
        created_at: timestamp(doc.get("createdAt")),
    }
}

//! Quick learning feed: short technical videos collected from YouTube channels and searches.

pub mod topics;

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::HubResult;
use crate::store::{Collection, DocumentStore, WriteMode};
use crate::types::{from_document, to_document, QuickShort, QuickShortsMeta, QuickShortsSources};
use crate::youtube::{normalize_handle, VideoSource};

pub use topics::{derive_topic, is_desired_title};

pub const SOURCES_DOC: &str = "quickShortsSources";
pub const META_DOC: &str = "quickShortsMeta";
const MAX_QUERIES: usize = 12;
const SEARCH_MAX_PER_QUERY: usize = 120;

pub const DEFAULT_HANDLES: [&str; 7] = [
    "freecodecamp",
    "GoogleDevelopers",
    "MicrosoftLearn",
    "GoogleCloudTech",
    "awsdevelopers",
    "fireship",
    "n8n",
];

pub const DEFAULT_QUERIES: [&str; 10] = [
    "llm",
    "agentic ai",
    "prompt engineering",
    "genai",
    "transformers neural network",
    "claude code",
    "n8n automation",
    "react",
    "html",
    "python machine learning",
];

#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub max_new: usize,
    pub max_per_source: usize,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            max_new: 40,
            max_per_source: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub ok: bool,
    pub committed: usize,
    pub sources: usize,
    pub queries: usize,
    pub added: Vec<QuickShort>,
}

/// Newest first, optionally restricted to one topic (case-insensitive).
pub async fn list_quick_shorts(store: &dyn DocumentStore, topic: Option<&str>) -> HubResult<Vec<QuickShort>> {
    let topic = topic.map(str::trim).filter(|t| !t.is_empty());
    let mut shorts = Vec::new();
    for snapshot in store.list(Collection::QuickShorts).await? {
        match from_document::<QuickShort>(snapshot.data) {
            Ok(mut short) => {
                if short.video_id.is_empty() {
                    short.video_id = snapshot.id;
                }
                if topic.map_or(true, |t| short.topic.eq_ignore_ascii_case(t)) {
                    shorts.push(short);
                }
            }
            Err(e) => tracing::warn!("Skipping malformed short {}: {}", snapshot.id, e),
        }
    }
    shorts.sort_by_key(|s| std::cmp::Reverse(s.added_at_ms));
    Ok(shorts)
}

pub async fn get_sources(store: &dyn DocumentStore) -> HubResult<QuickShortsSources> {
    Ok(match store.get(Collection::Config, SOURCES_DOC).await? {
        Some(doc) => from_document(doc)?,
        None => QuickShortsSources::default(),
    })
}

pub async fn save_sources(store: &dyn DocumentStore, sources: QuickShortsSources) -> HubResult<QuickShortsSources> {
    let cleaned = QuickShortsSources {
        handles: unique_handles(sources.handles.iter().map(String::as_str)),
        queries: unique_queries(sources.queries.iter().map(String::as_str), usize::MAX),
    };
    store
        .set(Collection::Config, SOURCES_DOC, to_document(&cleaned)?, WriteMode::Merge)
        .await?;
    tracing::info!(
        "Saved quick shorts sources ({} handles, {} queries)",
        cleaned.handles.len(),
        cleaned.queries.len()
    );
    Ok(cleaned)
}

/// Normalized handles, first spelling kept, duplicates dropped case-insensitively.
pub fn unique_handles<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(normalize_handle)
        .filter(|h| !h.is_empty())
        .filter(|h| seen.insert(h.to_lowercase()))
        .collect()
}

fn unique_queries<'a>(raw: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.clone()))
        .take(limit)
        .collect()
}

struct Candidate {
    video_id: String,
    source: String,
    title: String,
}

/// Pull new embeddable shorts into the feed, round-robin across channel handles then search
/// queries so no single source dominates.
pub async fn refresh_quick_shorts(
    store: &dyn DocumentStore,
    videos: &dyn VideoSource,
    options: RefreshOptions,
) -> HubResult<RefreshReport> {
    let configured = get_sources(store).await?;
    let handles = unique_handles(
        configured
            .handles
            .iter()
            .map(String::as_str)
            .chain(DEFAULT_HANDLES),
    );
    let queries = unique_queries(
        configured
            .queries
            .iter()
            .map(String::as_str)
            .chain(DEFAULT_QUERIES),
        MAX_QUERIES,
    );

    let started_at_ms = chrono::Utc::now().timestamp_millis();
    tracing::info!(
        "Refreshing quick shorts from {} handles and {} queries",
        handles.len(),
        queries.len()
    );

    let mut by_handle = Vec::with_capacity(handles.len());
    for handle in &handles {
        let ids = videos.channel_short_ids(handle, options.max_per_source).await;
        by_handle.push((handle.clone(), VecDeque::from(ids)));
    }
    let mut by_query = Vec::with_capacity(queries.len());
    let search_max = SEARCH_MAX_PER_QUERY.min(options.max_per_source);
    for query in &queries {
        let ids = videos.search_short_ids(query, search_max).await;
        by_query.push((format!("q:{}", query), VecDeque::from(ids)));
    }

    let mut added: Vec<Candidate> = Vec::new();
    let mut seen = HashSet::new();
    let mut progressed = true;
    while added.len() < options.max_new && progressed {
        progressed = false;
        for (source, ids) in by_handle.iter_mut().chain(by_query.iter_mut()) {
            if added.len() >= options.max_new {
                break;
            }
            let Some(video_id) = ids.pop_front() else {
                continue;
            };
            progressed = true;
            if !seen.insert(video_id.clone()) {
                continue;
            }
            if store.get(Collection::QuickShorts, &video_id).await?.is_some() {
                continue;
            }
            let check = videos.check_embeddable(&video_id).await;
            if !check.ok || !is_desired_title(&check.title) {
                continue;
            }
            added.push(Candidate {
                video_id,
                source: source.clone(),
                title: check.title,
            });
        }
    }

    let mut committed = Vec::with_capacity(added.len());
    for candidate in added {
        let short = QuickShort {
            topic: derive_topic(&candidate.title).to_string(),
            video_id: candidate.video_id,
            title: candidate.title,
            source_handle: candidate.source,
            embeddable: true,
            added_at_ms: chrono::Utc::now().timestamp_millis(),
            added_by: "scheduler".to_string(),
        };
        store
            .set(Collection::QuickShorts, &short.video_id, to_document(&short)?, WriteMode::Replace)
            .await?;
        committed.push(short);
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let meta = QuickShortsMeta {
        updated_at_ms: now_ms,
        last_run_at_ms: now_ms,
        last_run_started_at_ms: started_at_ms,
        last_run_added_count: committed.len(),
        sources_count: handles.len(),
        queries_count: queries.len(),
    };
    store
        .set(Collection::Config, META_DOC, to_document(&meta)?, WriteMode::Merge)
        .await?;

    tracing::info!("Quick shorts refresh added {} videos", committed.len());
    Ok(RefreshReport {
        ok: true,
        committed: committed.len(),
        sources: handles.len(),
        queries: queries.len(),
        added: committed,
    })
}

pub async fn get_meta(store: &dyn DocumentStore) -> HubResult<Option<QuickShortsMeta>> {
    match store.get(Collection::Config, META_DOC).await? {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}

/// Seeds one feed entry by hand, bypassing the title filter.
pub async fn add_manual_short(
    store: &dyn DocumentStore,
    video_id: &str,
    title: &str,
    added_by: &str,
) -> HubResult<QuickShort> {
    let short = QuickShort {
        video_id: video_id.trim().to_string(),
        title: title.trim().to_string(),
        topic: derive_topic(title).to_string(),
        source_handle: "manual".to_string(),
        embeddable: true,
        added_at_ms: chrono::Utc::now().timestamp_millis(),
        added_by: added_by.to_string(),
    };
    store
        .set(Collection::QuickShorts, &short.video_id, to_document(&short)?, WriteMode::Replace)
        .await?;
    Ok(short)
}

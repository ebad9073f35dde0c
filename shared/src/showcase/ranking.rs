use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::normalize::timestamp_millis;
use crate::types::ShowcaseProject;

const AGE_EXPONENT: f64 = 0.7;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// `(2 * upvotes + comments) / ageHours^0.7`, with age floored at one hour.
pub fn compute_trending_score(
    upvotes: i64,
    comments_count: i64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let age_hours = ((now - created_at).num_milliseconds() as f64 / MS_PER_HOUR).max(1.0);
    (2.0 * upvotes as f64 + comments_count as f64) / age_hours.powf(AGE_EXPONENT)
}

fn project_score(project: &ShowcaseProject, now: DateTime<Utc>) -> f64 {
    let created = DateTime::from_timestamp_millis(timestamp_millis(&project.created_at))
        .unwrap_or(now);
    compute_trending_score(project.upvotes, project.comments_count, created, now)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Trending,
    Newest,
}

impl SortMode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("newest") => SortMode::Newest,
            _ => SortMode::Trending,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Case-insensitive substring of the project name.
    pub q: Option<String>,
    /// Exact tag membership.
    pub tag: Option<String>,
    pub sort: SortMode,
}

pub fn filter_and_sort(
    projects: Vec<ShowcaseProject>,
    query: &FeedQuery,
    now: DateTime<Utc>,
) -> Vec<ShowcaseProject> {
    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let mut list: Vec<ShowcaseProject> = projects
        .into_iter()
        .filter(|p| {
            needle
                .as_deref()
                .map_or(true, |n| p.name.to_lowercase().contains(n))
        })
        .filter(|p| tag.map_or(true, |t| p.tags.iter().any(|pt| pt == t)))
        .collect();

    match query.sort {
        SortMode::Newest => {
            list.sort_by_key(|p| std::cmp::Reverse(timestamp_millis(&p.created_at)))
        }
        SortMode::Trending => list.sort_by(|a, b| {
            project_score(b, now)
                .partial_cmp(&project_score(a, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    list
}

/// Every tag in use, sorted.
pub fn all_tags(projects: &[ShowcaseProject]) -> Vec<String> {
    projects
        .iter()
        .flat_map(|p| p.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

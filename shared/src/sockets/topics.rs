//! Realtime topics. A document change is pushed to every topic it belongs to.

use crate::showcase::normalize::text;
use crate::store::{Collection, Document};

pub const SHOWCASE_PROJECTS: &str = "showcaseProjects";
pub const QUICK_SHORTS: &str = "quickShorts";
pub const COURSES: &str = "courses";
pub const ANNOUNCEMENTS: &str = "announcements";

const PLAIN_TOPICS: [&str; 4] = [SHOWCASE_PROJECTS, QUICK_SHORTS, COURSES, ANNOUNCEMENTS];

pub fn comments_topic(project_id: &str) -> String {
    format!("showcaseComments:{}", project_id)
}

pub fn suggestions_topic(to_name_lower: &str) -> String {
    format!("showcaseSuggestions:{}", to_name_lower)
}

pub fn is_valid_topic(topic: &str) -> bool {
    if PLAIN_TOPICS.contains(&topic) {
        return true;
    }
    ["showcaseComments:", "showcaseSuggestions:"]
        .iter()
        .any(|prefix| topic.strip_prefix(prefix).is_some_and(|rest| !rest.trim().is_empty()))
}

/// Topics notified when a document in `collection` changes. Collections without realtime
/// subscribers return nothing.
pub fn topics_for_change(collection: Collection, doc: &Document) -> Vec<String> {
    match collection {
        Collection::ShowcaseProjects => vec![SHOWCASE_PROJECTS.to_string()],
        // Counter bumps arrive as project changes; the comment itself goes to its thread.
        Collection::ShowcaseComments => {
            let project_id = text(doc, "projectId");
            if project_id.is_empty() {
                Vec::new()
            } else {
                vec![comments_topic(&project_id)]
            }
        }
        Collection::ShowcaseSuggestions => {
            let mut key = text(doc, "toNameLower");
            if key.is_empty() {
                key = text(doc, "toName").to_lowercase();
            }
            if key.is_empty() {
                Vec::new()
            } else {
                vec![suggestions_topic(&key)]
            }
        }
        Collection::QuickShorts => vec![QUICK_SHORTS.to_string()],
        Collection::Courses => vec![COURSES.to_string()],
        Collection::Announcements => vec![ANNOUNCEMENTS.to_string()],
        // User documents are admin-only and never pushed.
        Collection::Users
        | Collection::UserCourses
        | Collection::ShowcaseUpvotes
        | Collection::Config
        | Collection::WsConnections => Vec::new(),
    }
}

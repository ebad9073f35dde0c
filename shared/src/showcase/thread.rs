use std::collections::HashMap;

use serde::Serialize;

use super::normalize::timestamp_millis;
use crate::types::ShowcaseComment;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub comment: ShowcaseComment,
    pub replies: Vec<ThreadNode>,
}

/// Nest a flat comment list into a forest.
///
/// Roots keep input order; replies are sorted by `(createdAt, input position)`. A comment is
/// attached to its parent only when the parent is present and strictly earlier in that order,
/// otherwise it becomes a root. Every comment appears exactly once and cycles cannot form.
pub fn build_thread_tree(comments: &[ShowcaseComment]) -> Vec<ThreadNode> {
    let order: Vec<(i64, usize)> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (timestamp_millis(&c.created_at), i))
        .collect();

    let mut index_by_id: HashMap<&str, usize> = HashMap::new();
    for (i, c) in comments.iter().enumerate() {
        index_by_id.entry(c.id.as_str()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();

    for (i, comment) in comments.iter().enumerate() {
        let parent = comment
            .parent_id
            .as_deref()
            .and_then(|pid| index_by_id.get(pid).copied())
            .filter(|&p| order[p] < order[i]);

        match parent {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    for replies in &mut children {
        replies.sort_by_key(|&i| order[i]);
    }

    roots
        .into_iter()
        .map(|i| build_node(i, comments, &children))
        .collect()
}

fn build_node(i: usize, comments: &[ShowcaseComment], children: &[Vec<usize>]) -> ThreadNode {
    ThreadNode {
        comment: comments[i].clone(),
        replies: children[i]
            .iter()
            .map(|&c| build_node(c, comments, children))
            .collect(),
    }
}

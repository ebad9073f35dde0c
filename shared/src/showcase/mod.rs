//! Showcase forum: projects, threaded comments, upvotes, suggestions and demo videos.

pub mod comments;
pub mod media;
pub mod normalize;
pub mod projects;
pub mod ranking;
pub mod suggestions;
pub mod thread;

pub use media::{MediaStore, S3MediaStore};
pub use ranking::{compute_trending_score, FeedQuery, SortMode};
pub use thread::{build_thread_tree, ThreadNode};

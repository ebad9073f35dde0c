pub mod announcements;
pub mod auth;
pub mod config;
pub mod courses;
pub mod error;
pub mod gemini;
pub mod quick_shorts;
pub mod response;
pub mod runtime_config;
pub mod showcase;
pub mod sockets;
pub mod store;
pub mod types;
pub mod url_check;
pub mod users;
pub mod youtube;

use std::sync::Arc;

use auth::Caller;
use config::HubConfig;
use error::HubResult;
use showcase::MediaStore;
use store::LocalFirstStore;
use youtube::{VideoSource, YouTubeClient};

/// Shared application state
pub struct AppState {
    pub config: HubConfig,
    pub store: Arc<LocalFirstStore>,
    pub media: Option<Arc<dyn MediaStore>>,
    pub http: reqwest::Client,
    pub youtube: YouTubeClient,
    pub videos: Arc<dyn VideoSource>,
}

impl AppState {
    pub fn new(
        config: HubConfig,
        store: LocalFirstStore,
        media: Option<Arc<dyn MediaStore>>,
        http: reqwest::Client,
    ) -> Arc<Self> {
        let youtube = YouTubeClient::new(http.clone());
        Arc::new(Self {
            config,
            store: Arc::new(store),
            media,
            videos: Arc::new(youtube.clone()),
            youtube,
            http,
        })
    }

    /// Cache-only state with no remote store or media bucket.
    pub fn in_memory(config: HubConfig) -> Arc<Self> {
        Self::new(config, LocalFirstStore::local_only(), None, reqwest::Client::new())
    }

    pub async fn is_admin(&self, caller: &Caller) -> HubResult<bool> {
        users::is_admin(self.store.as_ref(), &self.config, &caller.email).await
    }
}

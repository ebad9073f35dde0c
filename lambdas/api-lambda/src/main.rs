use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use hub_shared::config::HubConfig;
use hub_shared::showcase::{MediaStore, S3MediaStore};
use hub_shared::store::{DocumentStore, DynamoStore, LocalFirstStore};
use hub_shared::{sockets, AppState};
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;
use std::time::Duration;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = HubConfig::load();

    // Initialize AWS clients once at startup
    let aws = aws_config::load_from_env().await;

    let store = if config.local_cache_only {
        tracing::warn!("LOCAL_CACHE_ONLY set, documents live only in this instance's cache");
        LocalFirstStore::local_only()
    } else {
        let remote: Arc<dyn DocumentStore> =
            Arc::new(DynamoStore::new(DynamoClient::new(&aws), config.table_name.clone()));
        LocalFirstStore::new(Some(remote))
    };

    let media = config.demo_video_bucket.clone().map(|bucket| {
        Arc::new(S3MediaStore::new(S3Client::new(&aws), bucket)) as Arc<dyn MediaStore>
    });
    if media.is_none() {
        tracing::info!("DEMO_VIDEO_BUCKET not set, demo video uploads disabled");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()?;

    let state = AppState::new(config, store, media, http);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            match sockets::websocket_route(&event) {
                Some((connection_id, route_key)) => {
                    sockets::handle_websocket_event(event, state, &connection_id, &route_key).await
                }
                None => http_handler::function_handler(event, state).await,
            }
        }
    }))
    .await
}

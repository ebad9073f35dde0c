//! Scheduled quick shorts refresh. Triggered by an EventBridge rule; the event body is ignored.

use aws_sdk_dynamodb::Client as DynamoClient;
use hub_shared::config::HubConfig;
use hub_shared::quick_shorts::{refresh_quick_shorts, RefreshOptions, RefreshReport};
use hub_shared::store::DynamoStore;
use hub_shared::youtube::YouTubeClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct RefreshContext {
    store: DynamoStore,
    videos: YouTubeClient,
    options: RefreshOptions,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = HubConfig::load();
    let aws = aws_config::load_from_env().await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()?;

    let context = Arc::new(RefreshContext {
        store: DynamoStore::new(DynamoClient::new(&aws), config.table_name.clone()),
        videos: YouTubeClient::new(http),
        options: RefreshOptions {
            max_new: config.quick_shorts_max_new,
            max_per_source: config.quick_shorts_max_per_source,
        },
    });

    run(service_fn(move |event: LambdaEvent<Value>| {
        let context = Arc::clone(&context);
        async move { function_handler(event, &context).await }
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Value>, context: &RefreshContext) -> Result<RefreshReport, Error> {
    tracing::info!("Quick shorts refresh triggered (request {})", event.context.request_id);

    let report = refresh_quick_shorts(&context.store, &context.videos, context.options).await?;
    tracing::info!(
        "Quick shorts refresh committed {} new shorts from {} sources and {} queries",
        report.committed,
        report.sources,
        report.queries
    );
    Ok(report)
}

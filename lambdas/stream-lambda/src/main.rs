use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use hub_shared::config::HubConfig;
use hub_shared::sockets::{broadcast_change, ConnectionPusher, DocumentChange};
use hub_shared::store::{DocumentStore, DynamoStore};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct StreamContext {
    store: DynamoStore,
    pusher: Option<ApiGatewayManagementClient>,
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

    // Without an endpoint the records are decoded and logged but nothing is pushed
    let pusher = match config.ws_api_endpoint.as_deref() {
        Some(endpoint) => {
            let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&aws)
                .endpoint_url(endpoint)
                .build();
            Some(ApiGatewayManagementClient::from_conf(api_config))
        }
        None => {
            tracing::error!("WS_API_ENDPOINT is not set, realtime broadcasts are disabled");
            None
        }
    };

    let context = Arc::new(StreamContext {
        store: DynamoStore::new(DynamoClient::new(&aws), config.table_name.clone()),
        pusher,
    });

    run(service_fn(move |event: LambdaEvent<Event>| {
        let context = Arc::clone(&context);
        async move { function_handler(event, &context).await }
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Event>, context: &StreamContext) -> Result<(), Error> {
    tracing::info!("DynamoDB Stream event received with {} records", event.payload.records.len());

    for record in &event.payload.records {
        if let Err(e) = process_record(record, context).await {
            tracing::error!("Failed to process record: {}", e);
        }
    }

    Ok(())
}

async fn process_record(record: &EventRecord, context: &StreamContext) -> Result<(), Error> {
    let new_image = serde_json::to_value(&record.change.new_image)?;
    let old_image = serde_json::to_value(&record.change.old_image)?;

    let Some(change) = DocumentChange::from_stream(&record.event_name, &new_image, &old_image) else {
        tracing::debug!("Skipping {} record outside the document collections", record.event_name);
        return Ok(());
    };
    tracing::info!("Processing {} {} ({:?})", change.collection, change.id, change.kind);

    let Some(pusher) = context.pusher.as_ref() else {
        return Ok(());
    };
    let store: &dyn DocumentStore = &context.store;
    let pusher: &dyn ConnectionPusher = pusher;
    let report = broadcast_change(store, pusher, &change).await?;

    tracing::info!(
        "Broadcast {} {}: sent {}, failed {}, pruned {}",
        change.collection,
        change.id,
        report.sent,
        report.failed,
        report.pruned
    );
    Ok(())
}

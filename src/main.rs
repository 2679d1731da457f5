//! live-sync - watches the incident list broadcast and, optionally, one
//! incident feed, logging every event until Ctrl-C.
//!
//! ```text
//! LIVE_SYNC__ENDPOINT__BASE_URL=wss://rt.example.com \
//! LIVE_SYNC__CREDENTIALS__TOKEN=... \
//!     live-sync --incident 42
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use live_sync::adapters::http::{HttpMutationGateway, HttpPresenceApi};
use live_sync::adapters::memory::{
    InMemoryPresenceApi, InMemoryProjectionStore, ScriptedMutationGateway, StaticCredentialStore,
};
use live_sync::adapters::websocket::{EndpointBuilder, TungsteniteTransport};
use live_sync::application::{Collaborators, LiveSync, Subscription, TopicEvent};
use live_sync::config::SyncConfig;
use live_sync::domain::foundation::ResourceId;
use live_sync::domain::topic::Topic;
use live_sync::ports::{CredentialStore, MutationGateway, PresenceApi};

#[tokio::main]
async fn main() -> Result<()> {
    let config = SyncConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;
    config.logging.init();

    let incident = incident_arg(std::env::args().skip(1))?;

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(StaticCredentialStore::from_config(&config.credentials));
    let endpoint = EndpointBuilder::from_config(&config.endpoint, Arc::clone(&credentials));

    let (presence_api, mutations): (Arc<dyn PresenceApi>, Arc<dyn MutationGateway>) =
        match &config.endpoint.api_base_url {
            Some(api) => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .context("building HTTP client")?;
                (
                    Arc::new(HttpPresenceApi::new(client.clone(), api.clone(), Arc::clone(&credentials))),
                    Arc::new(HttpMutationGateway::new(client, api.clone(), Arc::clone(&credentials))),
                )
            }
            None => {
                tracing::warn!("No api_base_url configured, presence and mutations stay local");
                (
                    Arc::new(InMemoryPresenceApi::new()),
                    Arc::new(ScriptedMutationGateway::new()),
                )
            }
        };

    let sync = LiveSync::new(
        &config,
        Collaborators {
            transport: Arc::new(TungsteniteTransport::default()),
            endpoint: Arc::new(endpoint),
            credentials,
            presence_api,
            projections: Arc::new(InMemoryProjectionStore::new()),
            mutations,
        },
    )?;

    let mut watchers = Vec::new();
    let list = sync.registry().subscribe(Topic::ListBroadcast).await;
    watchers.push(tokio::spawn(log_events(list)));
    if let Some(id) = incident {
        let feed = sync.registry().subscribe(Topic::resource(id)).await;
        watchers.push(tokio::spawn(log_events(feed)));
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("Shutting down");
    sync.shutdown().await;
    for watcher in watchers {
        let _ = watcher.await;
    }
    Ok(())
}

async fn log_events(mut subscription: Subscription) {
    let topic = subscription.topic().clone();
    while let Some(event) = subscription.next_event().await {
        match event {
            TopicEvent::Status(state) => tracing::info!(topic = %topic, state = %state, "Connection state"),
            TopicEvent::Message(message) => tracing::info!(
                topic = %topic,
                kind = %message.kind(),
                resource = ?message.resource_id().map(|r| r.as_str()),
                "Message"
            ),
        }
    }
}

fn incident_arg(mut args: impl Iterator<Item = String>) -> Result<Option<ResourceId>> {
    while let Some(arg) = args.next() {
        if arg == "--incident" {
            let value = args.next().context("--incident needs an id")?;
            return Ok(Some(ResourceId::new(value)?));
        }
    }
    Ok(None)
}

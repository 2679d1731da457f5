//! Composition root of the synchronization layer.

use std::sync::Arc;

use super::advisories::{AdvisoryNotifier, ADVISORY_KINDS};
use super::cache_sync::{CacheSynchronizer, PROJECTION_KINDS};
use super::notifier::Notifier;
use super::presence_tracker::{PresenceTracker, PRESENCE_KINDS};
use super::registry::{RegistrySettings, TopicRegistry};
use super::router::MessageRouter;
use super::version_guard::{GuardError, VersionGuard, GUARDED_KINDS};
use crate::config::{SyncConfig, ValidationError};
use crate::ports::{
    CredentialStore, EndpointResolver, MutationGateway, PresenceApi, ProjectionStore, Transport,
};

/// Errors surfaced by the facade.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error(transparent)]
    Guard(#[from] GuardError),
}

/// External collaborators the layer is wired to.
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub endpoint: Arc<dyn EndpointResolver>,
    pub credentials: Arc<dyn CredentialStore>,
    pub presence_api: Arc<dyn PresenceApi>,
    pub projections: Arc<dyn ProjectionStore>,
    pub mutations: Arc<dyn MutationGateway>,
}

/// The assembled layer: registry, router and every handler.
pub struct LiveSync {
    registry: TopicRegistry,
    router: Arc<MessageRouter>,
    notifier: Arc<Notifier>,
    presence: Arc<PresenceTracker>,
    version_guard: Arc<VersionGuard>,
}

impl LiveSync {
    /// Validates `config` and wires the handlers to the router.
    pub fn new(config: &SyncConfig, collaborators: Collaborators) -> Result<Self, SyncError> {
        config.validate()?;

        let Collaborators {
            transport,
            endpoint,
            credentials,
            presence_api,
            projections,
            mutations,
        } = collaborators;

        let notifier = Arc::new(Notifier::new());
        let router = Arc::new(MessageRouter::new());

        let cache_sync = Arc::new(CacheSynchronizer::new(Arc::clone(&projections)));
        let advisories = Arc::new(AdvisoryNotifier::new(
            Arc::clone(&notifier),
            Arc::clone(&credentials),
        ));
        let presence = Arc::new(PresenceTracker::new(
            presence_api,
            credentials,
            config.presence.settings(),
        ));
        let version_guard = Arc::new(VersionGuard::new(
            projections,
            mutations,
            Arc::clone(&notifier),
        ));

        router.register(&PROJECTION_KINDS, cache_sync);
        router.register(&ADVISORY_KINDS, advisories);
        router.register(&PRESENCE_KINDS, presence.clone());
        router.register(&GUARDED_KINDS, version_guard.clone());

        let settings = RegistrySettings {
            policy: config.reconnect.policy(),
            connect_timeout: config.endpoint.connect_timeout(),
            channel_capacity: config.channel_capacity,
        };
        let registry = TopicRegistry::new(
            transport,
            endpoint,
            Arc::clone(&router),
            Arc::clone(&notifier),
            settings,
        )
        .with_lifecycle(presence.clone());

        tracing::info!(
            capacity = config.channel_capacity,
            max_attempts = settings.policy.max_attempts,
            "Live sync assembled"
        );

        Ok(Self {
            registry,
            router,
            notifier,
            presence,
            version_guard,
        })
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn version_guard(&self) -> &VersionGuard {
        &self.version_guard
    }

    /// Releases every topic and waits for the workers to stop.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

//! Composer session wiring
//!
//! Builds every engine component for one signed-in user from a
//! [`CrosspostConfig`] and a set of collaborators, and tears down
//! session-scoped state when the user leaves.

use crate::assistant::{AssistantBridge, AssistantBridgeParts};
use crate::clients::{
    AssistantService, HttpAssistantClient, HttpIdentityClient, IdentityProvider,
    PublisherRegistry,
};
use crate::config::CrosspostConfig;
use crate::connection::{
    AuthWindowLauncher, CallbackServer, ConnectionManager, ConnectionManagerParts,
    ConnectionStore, SystemBrowser,
};
use crate::draft::DraftOrchestrator;
use crate::events::{ComposerEvent, EventBus};
use crate::guard::UnsavedContentGuard;
use crate::model::{PlanTier, SavedDraft};
use crate::platform::{DraftId, UserId};
use crate::publish::{PublicationPipeline, PublicationPipelineParts, QuotaGate};
use crate::store::{DocumentStore, SqliteDocumentStore, WriteMode};
use crate::{CrosspostError, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// External collaborators a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub assistant: Arc<dyn AssistantService>,
    pub publishers: PublisherRegistry,
    pub store: Arc<dyn DocumentStore>,
    pub launcher: Arc<dyn AuthWindowLauncher>,
}

impl Collaborators {
    /// HTTP clients, the SQLite store and the system browser
    pub fn from_config(config: &CrosspostConfig) -> Result<Self> {
        Ok(Self {
            identity: Arc::new(HttpIdentityClient::from_config(&config.identity)?),
            assistant: Arc::new(HttpAssistantClient::from_config(&config.assistant)?),
            publishers: PublisherRegistry::from_config(config)?,
            store: Arc::new(SqliteDocumentStore::from_config(&config.storage)?),
            launcher: Arc::new(SystemBrowser),
        })
    }
}

/// All engine components for one user
#[derive(Clone)]
pub struct ComposerSession {
    user: UserId,
    bus: EventBus,
    store: Arc<dyn DocumentStore>,
    draft: DraftOrchestrator,
    connections: ConnectionStore,
    manager: ConnectionManager,
    assistant: AssistantBridge,
    pipeline: PublicationPipeline,
    guard: UnsavedContentGuard,
    callback_addr: Option<SocketAddr>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for ComposerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerSession")
            .field("user", &self.user)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl ComposerSession {
    /// Wire the components without touching the store
    pub fn new(
        config: &CrosspostConfig,
        user: UserId,
        tier: PlanTier,
        collaborators: Collaborators,
    ) -> Self {
        let catalog = config.catalog();
        let bus = EventBus::default();
        let connections = ConnectionStore::new();
        let draft = DraftOrchestrator::new(catalog.clone());
        let time_zone = config.composer.time_zone();

        let manager = ConnectionManager::new(ConnectionManagerParts {
            user: user.clone(),
            identity: collaborators.identity,
            launcher: collaborators.launcher,
            store: collaborators.store.clone(),
            connections: connections.clone(),
            bus: bus.clone(),
            catalog: Arc::new(catalog),
            origin: config.handshake.origin.clone(),
            poll_interval: config.handshake.poll_interval(),
        });

        let limits = config.quota.limits_for(&tier);
        let pipeline = PublicationPipeline::new(PublicationPipelineParts {
            user: user.clone(),
            draft: draft.clone(),
            connections: connections.clone(),
            publishers: collaborators.publishers,
            store: collaborators.store.clone(),
            bus: bus.clone(),
            quota: QuotaGate::new(tier, limits),
            time_zone,
        });

        let assistant = AssistantBridge::new(AssistantBridgeParts {
            user: user.clone(),
            service: collaborators.assistant,
            draft: draft.clone(),
            connections: connections.clone(),
            bus: bus.clone(),
            image_cooldown: Duration::from_secs(config.assistant.image_cooldown_secs),
            time_zone,
        })
        .with_pipeline(pipeline.clone());

        let guard = UnsavedContentGuard::new(
            user.clone(),
            config.composer.route.clone(),
            draft.clone(),
            collaborators.store.clone(),
            bus.clone(),
        );

        Self {
            user,
            bus,
            store: collaborators.store,
            draft,
            connections,
            manager,
            assistant,
            pipeline,
            guard,
            callback_addr: None,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wire the components, load connections and usage, and follow store changes
    ///
    /// Launchers whose windows cannot be observed also get the loopback
    /// callback listener on `handshake.callback_port`.
    pub async fn start(
        config: &CrosspostConfig,
        user: UserId,
        tier: PlanTier,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let listen = collaborators.launcher.needs_callback_listener();
        let mut session = Self::new(config, user, tier, collaborators);
        session.manager.refresh().await?;
        session.pipeline.refresh_usage().await?;

        let mut tasks = vec![
            session.manager.spawn_store_sync(),
            session.pipeline.spawn_usage_sync(),
        ];
        if listen {
            match CallbackServer::new(session.manager.clone())
                .spawn(config.handshake.callback_port)
                .await
            {
                Ok((addr, handle)) => {
                    session.callback_addr = Some(addr);
                    tasks.push(handle);
                }
                Err(e) => {
                    for handle in tasks {
                        handle.abort();
                    }
                    return Err(e);
                }
            }
        }
        *session.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;

        info!(
            user = %session.user,
            connected = session.connections.connected_platforms().len(),
            "Composer session started"
        );
        Ok(session)
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn draft(&self) -> &DraftOrchestrator {
        &self.draft
    }

    pub fn connections(&self) -> &ConnectionStore {
        &self.connections
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn assistant(&self) -> &AssistantBridge {
        &self.assistant
    }

    pub fn pipeline(&self) -> &PublicationPipeline {
        &self.pipeline
    }

    pub fn guard(&self) -> &UnsavedContentGuard {
        &self.guard
    }

    /// Address of the callback listener, when `start` spawned one
    pub fn callback_addr(&self) -> Option<SocketAddr> {
        self.callback_addr
    }

    /// Saved drafts, most recent first
    pub async fn list_drafts(&self) -> Result<Vec<SavedDraft>> {
        self.store.list_drafts(&self.user).await
    }

    /// Replace the composer contents with a saved draft
    pub async fn load_draft(&self, id: &DraftId) -> Result<()> {
        let saved = self
            .store
            .load_draft(&self.user, id)
            .await?
            .ok_or_else(|| CrosspostError::NotFound(format!("Draft {}", id)))?;
        self.draft.load_from(saved.snapshot);
        Ok(())
    }

    pub async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        self.store
            .delete_draft(&self.user, id, WriteMode::Critical)
            .await
    }

    /// Forget the chat and the draft, and stop the background tasks
    pub fn end_session(&self) {
        self.assistant.end_session();
        self.draft.clear();
        self.bus.emit(ComposerEvent::DraftCleared);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in tasks {
            handle.abort();
        }
        info!(user = %self.user, "Composer session ended");
    }
}

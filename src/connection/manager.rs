//! Platform Connection Manager
//!
//! Drives the external-auth handshake for one user:
//!
//! 1. Fetch an authorization URL from the identity provider
//! 2. Open it in a detached auth window
//! 3. Wait for whichever signal arrives first:
//!    - a completion message (`success`/`error`), which is authoritative
//!    - the poller seeing the window closed with no message
//! 4. Record the result in the Connection Store and the document store, and
//!    tell the user
//!
//! The two signals race; the registry lets exactly one of them resolve a
//! handshake. Nothing here returns handshake failures as errors: they become
//! [`HandshakeState::Failed`] plus a notification.

use super::callback::{CallbackRejection, CallbackStatus, OAuthCallback};
use super::handshake::{FailureReason, HandshakeRegistry, HandshakeState};
use super::store::ConnectionStore;
use super::window::{AuthWindow, AuthWindowLauncher};
use crate::clients::{IdentityProvider, RequestContext};
use crate::events::{ComposerEvent, EventBus, NotificationLevel};
use crate::metrics;
use crate::model::Connection;
use crate::platform::{PlatformCatalog, PlatformId, UserId};
use crate::store::{DocumentStore, StoreChange, WriteMode};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to one user's connection manager
#[derive(Clone)]
pub struct ConnectionManager {
    user: UserId,
    identity: Arc<dyn IdentityProvider>,
    launcher: Arc<dyn AuthWindowLauncher>,
    store: Arc<dyn DocumentStore>,
    connections: ConnectionStore,
    registry: Arc<Mutex<HandshakeRegistry>>,
    bus: EventBus,
    catalog: Arc<PlatformCatalog>,
    origin: Arc<str>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("user", &self.user)
            .field("origin", &self.origin)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Collaborators and settings for a [`ConnectionManager`]
pub struct ConnectionManagerParts {
    pub user: UserId,
    pub identity: Arc<dyn IdentityProvider>,
    pub launcher: Arc<dyn AuthWindowLauncher>,
    pub store: Arc<dyn DocumentStore>,
    pub connections: ConnectionStore,
    pub bus: EventBus,
    pub catalog: Arc<PlatformCatalog>,
    /// Application origin completion messages must come from
    pub origin: String,
    pub poll_interval: Duration,
}

impl ConnectionManager {
    pub fn new(parts: ConnectionManagerParts) -> Self {
        Self {
            user: parts.user,
            identity: parts.identity,
            launcher: parts.launcher,
            store: parts.store,
            connections: parts.connections,
            registry: Arc::new(Mutex::new(HandshakeRegistry::default())),
            bus: parts.bus,
            catalog: parts.catalog,
            origin: Arc::from(parts.origin.trim_end_matches('/')),
            poll_interval: parts.poll_interval,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HandshakeRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> RequestContext {
        RequestContext::new(self.user.clone())
    }

    pub fn connections(&self) -> &ConnectionStore {
        &self.connections
    }

    /// Current handshake state for a platform
    pub fn state(&self, platform: &PlatformId) -> HandshakeState {
        self.registry().state(platform)
    }

    /// Start connecting a platform and return the resulting state
    ///
    /// A second request while one is connecting is a no-op.
    pub async fn request_connect(&self, platform: &PlatformId) -> HandshakeState {
        let name = self.catalog.display_name(platform);

        let generation = match self.registry().begin(platform) {
            Some(generation) => generation,
            None => {
                debug!(platform = %platform, "Handshake already in progress");
                self.bus
                    .notify(NotificationLevel::Info, format!("{} is already connecting", name));
                return HandshakeState::Connecting;
            }
        };

        info!(platform = %platform, generation, "Starting handshake");
        self.bus.emit(ComposerEvent::ConnectionChanged {
            platform: platform.clone(),
            state: HandshakeState::Connecting,
        });

        let ctx = self.context();
        let url = match self.identity.authorization_url(platform, &ctx).await {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    platform = %platform,
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "Could not obtain authorization URL"
                );
                self.finish(
                    platform,
                    Some(generation),
                    HandshakeState::Failed(FailureReason::AuthorizationUnavailable),
                )
                .await;
                return self.state(platform);
            }
        };

        let window: Arc<dyn AuthWindow> = match self.launcher.open(&url) {
            Ok(window) => Arc::from(window),
            Err(e) => {
                warn!(platform = %platform, error = %e, "Auth window blocked");
                self.finish(
                    platform,
                    Some(generation),
                    HandshakeState::Failed(FailureReason::PopupBlocked),
                )
                .await;
                return self.state(platform);
            }
        };

        let attached = self
            .registry()
            .attach_window(platform, generation, window.clone());
        if !attached {
            // Resolved (e.g. cancelled) while the URL was being fetched
            window.close();
            return self.state(platform);
        }

        self.spawn_poller(platform.clone(), generation, window);
        self.state(platform)
    }

    fn spawn_poller(&self, platform: PlatformId, generation: u64, window: Arc<dyn AuthWindow>) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.poll_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !manager.registry().is_live(&platform, generation) {
                    debug!(platform = %platform, generation, "Poller exiting; handshake resolved");
                    return;
                }
                if window.is_closed() {
                    manager
                        .finish(
                            &platform,
                            Some(generation),
                            HandshakeState::Failed(FailureReason::ManualCancel),
                        )
                        .await;
                    return;
                }
            }
        });
    }

    /// Deliver a completion message from the auth context
    ///
    /// Returns `Ok(true)` if it resolved a handshake, `Ok(false)` if there was
    /// nothing to resolve, and a rejection for foreign origins or message types.
    pub async fn handle_message(
        &self,
        origin: &str,
        message: &OAuthCallback,
    ) -> std::result::Result<bool, CallbackRejection> {
        if let Err(rejection) = message.verify(&self.origin, origin) {
            warn!(origin = origin, reason = %rejection, "Ignoring auth completion message");
            return Err(rejection);
        }

        let platform = message.platform_id();
        let outcome = match message.status {
            CallbackStatus::Success => HandshakeState::Connected,
            CallbackStatus::Error => HandshakeState::Failed(FailureReason::RemoteError(
                message
                    .message
                    .clone()
                    .unwrap_or_else(|| "authorization was denied".to_string()),
            )),
        };

        Ok(self.finish(&platform, None, outcome).await)
    }

    /// Abandon a connecting handshake and close its window
    pub async fn cancel_connect(&self, platform: &PlatformId) -> bool {
        self.finish(platform, None, HandshakeState::Cancelled).await
    }

    /// Resolve a handshake once and apply the side effects
    async fn finish(
        &self,
        platform: &PlatformId,
        generation: Option<u64>,
        outcome: HandshakeState,
    ) -> bool {
        let resolution = self.registry().resolve(platform, generation, outcome.clone());
        let Some(resolution) = resolution else {
            debug!(platform = %platform, outcome = outcome.as_str(), "Handshake already resolved");
            return false;
        };

        info!(
            platform = %platform,
            generation = resolution.generation,
            outcome = outcome.as_str(),
            "Handshake resolved"
        );
        metrics::record_handshake(platform.as_str(), outcome.as_str());

        if let Some(window) = &resolution.window {
            window.close();
        }

        let name = self.catalog.display_name(platform);
        match &outcome {
            HandshakeState::Connected => {
                self.persist(Connection::connected(platform.clone())).await;
                self.bus.success(format!("{} connected", name));
            }
            HandshakeState::Failed(reason) => {
                self.persist(Connection::disconnected(platform.clone())).await;
                self.bus
                    .error(format!("Failed to connect {}: {}", name, reason));
            }
            HandshakeState::Cancelled => {
                self.bus
                    .notify(NotificationLevel::Info, format!("{} connection cancelled", name));
            }
            HandshakeState::Idle | HandshakeState::Connecting => {}
        }

        self.bus.emit(ComposerEvent::ConnectionChanged {
            platform: platform.clone(),
            state: outcome,
        });
        true
    }

    async fn persist(&self, connection: Connection) {
        self.connections.apply(connection.clone());
        if let Err(e) = self
            .store
            .put_connection(&self.user, &connection, WriteMode::Critical)
            .await
        {
            warn!(platform = %connection.platform_id, error = %e, "Could not save connection");
            self.bus.notify(
                NotificationLevel::Warning,
                format!(
                    "Couldn't save the {} connection",
                    self.catalog.display_name(&connection.platform_id)
                ),
            );
        }
    }

    /// Revoke and mark a platform disconnected
    ///
    /// The local state is always written; a revoke failure is only reported.
    pub async fn request_disconnect(&self, platform: &PlatformId) {
        let ctx = self.context();
        let name = self.catalog.display_name(platform);

        if let Err(e) = self.identity.revoke(platform, &ctx).await {
            warn!(
                platform = %platform,
                correlation_id = %ctx.correlation_id,
                error = %e,
                "Revoke failed; disconnecting locally"
            );
            self.bus.notify(
                NotificationLevel::Warning,
                format!("Couldn't revoke {} access remotely", name),
            );
        }

        self.registry().reset(platform);
        self.persist(Connection::disconnected(platform.clone())).await;
        self.bus
            .notify(NotificationLevel::Info, format!("{} disconnected", name));
        self.bus.emit(ComposerEvent::ConnectionChanged {
            platform: platform.clone(),
            state: HandshakeState::Idle,
        });
    }

    /// Load persisted connections into the Connection Store
    pub async fn refresh(&self) -> Result<()> {
        let connections = self.store.connections(&self.user).await?;
        debug!(count = connections.len(), "Loaded connections");
        self.connections.replace_all(connections);
        Ok(())
    }

    /// Apply connection changes from the document store as they happen
    pub fn spawn_store_sync(&self) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let connections = self.connections.clone();
        let user = self.user.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(StoreChange::ConnectionChanged {
                        user: changed,
                        connection,
                    }) if changed == user => connections.apply(connection),
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connection sync lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}

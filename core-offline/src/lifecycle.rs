//! # Lifecycle Controller
//!
//! Drives one cache version through its lifecycle:
//!
//! ```text
//! Uninstalled -> Provisioning -> Idle -> Activating -> Controlling
//!      ^              |                       ^             |
//!      +---- failure -+                       +- re-activate+
//! ```
//!
//! - **Provision** stores the whole application shell in the current
//!   namespace, or nothing at all.
//! - **Activate** deletes every other namespace and takes control of open
//!   clients.
//! - **Intercept** routes a request once the shell is provisioned. Before
//!   that, requests go straight to the network so a half-written namespace is
//!   never read.
//!
//! Provision and activate are serialized against each other. Intercepts run
//! concurrently with everything.

use bridge_traits::{CacheKey, HttpRequest, HttpResponse};
use core_async::sync::{Mutex, RwLock};
use core_runtime::config::OfflineConfig;
use core_runtime::events::{CoreEvent, EventBus, LifecycleEvent};
use core_runtime::logging::redact_url;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::error::{OfflineError, Result};
use crate::manifest::Manifest;
use crate::namespace::Namespace;
use crate::policy::{RoutingDecision, RoutingPolicy};
use crate::request::RequestDescriptor;
use crate::strategy::StrategyExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninstalled,
    Provisioning,
    Idle,
    Activating,
    Controlling,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninstalled => "uninstalled",
            LifecycleState::Provisioning => "provisioning",
            LifecycleState::Idle => "idle",
            LifecycleState::Activating => "activating",
            LifecycleState::Controlling => "controlling",
        }
    }

    /// Whether the current namespace is complete and may be read.
    pub fn serves_from_cache(&self) -> bool {
        matches!(
            self,
            LifecycleState::Idle | LifecycleState::Activating | LifecycleState::Controlling
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub namespace: String,
    /// Manifest entries stored.
    pub entries: usize,
}

/// Outcome of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub namespace: String,
    /// Stale namespaces that were deleted.
    pub deleted: Vec<String>,
    /// Stale namespaces that could not be deleted. They are retried on the
    /// next activation.
    pub failed: Vec<String>,
    pub clients_claimed: usize,
}

pub struct LifecycleController {
    config: OfflineConfig,
    namespace: Namespace,
    manifest: Manifest,
    policy: RoutingPolicy,
    executor: StrategyExecutor,
    state: RwLock<LifecycleState>,
    transition: Mutex<()>,
    events: EventBus,
}

impl LifecycleController {
    pub fn new(config: &OfflineConfig, events: EventBus) -> Self {
        let namespace = Namespace::current(config);
        let manifest = Manifest::from_config(config);
        let executor = StrategyExecutor::new(
            config.http_client.clone(),
            config.cache_storage.clone(),
            namespace.clone(),
            manifest.fallback_key().cloned(),
            config.cache_api_responses,
            events.clone(),
        );

        Self {
            config: config.clone(),
            namespace,
            manifest,
            policy: RoutingPolicy::from_config(config),
            executor,
            state: RwLock::new(LifecycleState::Uninstalled),
            transition: Mutex::new(()),
            events,
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Wait for every background cache write started so far.
    pub async fn wait_for_background_writes(&self) {
        self.executor.writer().wait_idle().await;
    }

    /// Fetch and store the whole application shell.
    ///
    /// Every entry is fetched before anything is written. If any fetch or
    /// write fails the controller returns to `Uninstalled` and a namespace
    /// created by this attempt is deleted, so a retry starts clean.
    ///
    /// # Errors
    ///
    /// - [`OfflineError::InvalidState`] unless the controller is `Uninstalled`
    /// - [`OfflineError::ProvisionFailed`] naming the entry that failed
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn on_provision(&self) -> Result<ProvisionReport> {
        let _transition = self.transition.lock().await;

        let current = self.state().await;
        if current != LifecycleState::Uninstalled {
            return Err(OfflineError::InvalidState {
                operation: "provision",
                state: current,
            });
        }

        self.set_state(LifecycleState::Provisioning).await;
        info!(entries = self.manifest.len(), "Provisioning application shell");

        match self.provision_shell().await {
            Ok(entries) => {
                self.set_state(LifecycleState::Idle).await;
                info!(entries, "Application shell provisioned");
                self.emit(LifecycleEvent::Provisioned {
                    namespace: self.namespace.to_string(),
                    entries,
                });

                if self.config.skip_waiting {
                    self.skip_waiting().await;
                }

                Ok(ProvisionReport {
                    namespace: self.namespace.to_string(),
                    entries,
                })
            }
            Err(err) => {
                self.set_state(LifecycleState::Uninstalled).await;
                warn!(error = %err, "Provisioning failed");

                let entry = match &err {
                    OfflineError::ProvisionFailed { entry, .. } => entry.clone(),
                    _ => String::new(),
                };
                self.emit(LifecycleEvent::ProvisionFailed {
                    namespace: self.namespace.to_string(),
                    entry,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn provision_shell(&self) -> Result<usize> {
        let fetched = self
            .manifest
            .fetch_all(&self.config.http_client, self.config.provision_concurrency)
            .await?;

        let storage = &self.config.cache_storage;
        let existed = storage
            .has(self.namespace.as_str())
            .await
            .unwrap_or_else(|e| {
                // Unknown counts as pre-existing: never delete it below.
                warn!(error = %e, "Could not check namespace, keeping it on failure");
                true
            });

        let stored = self.store_all(fetched).await;

        if stored.is_err() && !existed {
            if let Err(e) = storage.delete(self.namespace.as_str()).await {
                warn!(error = %e, "Could not remove partially provisioned namespace");
            }
        }

        stored
    }

    async fn store_all(&self, fetched: Vec<(CacheKey, HttpResponse)>) -> Result<usize> {
        let failed = |key: &CacheKey, reason: String| OfflineError::ProvisionFailed {
            entry: redact_url(&key.url),
            reason,
        };

        let cache = match self.config.cache_storage.open(self.namespace.as_str()).await {
            Ok(cache) => cache,
            Err(e) => {
                return Err(match fetched.first() {
                    Some((key, _)) => failed(key, e.to_string()),
                    None => OfflineError::Store(e),
                })
            }
        };

        let total = fetched.len();
        for (key, response) in fetched {
            if let Err(e) = cache.put(key.clone(), response).await {
                return Err(failed(&key, e.to_string()));
            }
            debug!(url = %redact_url(&key.url), "Stored manifest entry");
        }
        Ok(total)
    }

    async fn skip_waiting(&self) {
        let Some(control) = &self.config.client_control else {
            return;
        };
        match control.skip_waiting().await {
            Ok(()) => debug!("Skipped waiting"),
            Err(e) => warn!(error = %e, "skip_waiting failed"),
        }
    }

    /// Delete every namespace but the current one and take control.
    ///
    /// Valid from `Idle`, and again from `Controlling` where it simply
    /// repeats the cleanup.
    ///
    /// # Errors
    ///
    /// - [`OfflineError::InvalidState`] from any other state
    /// - [`OfflineError::Store`] if the namespaces cannot be listed; the
    ///   previous state is kept
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn on_activate(&self) -> Result<ActivationReport> {
        let _transition = self.transition.lock().await;

        let previous = self.state().await;
        if !matches!(previous, LifecycleState::Idle | LifecycleState::Controlling) {
            return Err(OfflineError::InvalidState {
                operation: "activate",
                state: previous,
            });
        }

        self.set_state(LifecycleState::Activating).await;

        let storage = &self.config.cache_storage;
        let existing = match storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(previous).await;
                return Err(OfflineError::Store(e));
            }
        };

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for stale in self.namespace.stale_among(&existing) {
            match storage.delete(stale).await {
                Ok(_) => {
                    info!(stale, "Deleted stale namespace");
                    deleted.push(stale.to_string());
                }
                Err(e) => {
                    warn!(stale, error = %e, "Failed to delete stale namespace");
                    self.emit(LifecycleEvent::NamespaceDeleteFailed {
                        namespace: stale.to_string(),
                        message: e.to_string(),
                    });
                    failed.push(stale.to_string());
                }
            }
        }

        self.set_state(LifecycleState::Controlling).await;

        let clients_claimed = if self.config.claim_clients {
            self.claim_clients().await
        } else {
            0
        };

        info!(
            deleted = deleted.len(),
            failed = failed.len(),
            clients_claimed,
            "Activated"
        );
        self.emit(LifecycleEvent::Activated {
            namespace: self.namespace.to_string(),
            deleted: deleted.clone(),
            clients_claimed,
        });

        Ok(ActivationReport {
            namespace: self.namespace.to_string(),
            deleted,
            failed,
            clients_claimed,
        })
    }

    async fn claim_clients(&self) -> usize {
        let Some(control) = &self.config.client_control else {
            return 0;
        };
        match control.claim().await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(error = %e, "Claiming clients failed");
                0
            }
        }
    }

    /// Serve one intercepted request.
    ///
    /// # Errors
    ///
    /// [`OfflineError::Fetch`] carrying the host's error when the network
    /// failed and no stored response or fallback document applied.
    #[instrument(skip(self, request), fields(method = %request.method, url = %redact_url(&request.url)))]
    pub async fn on_intercept(&self, request: HttpRequest) -> Result<HttpResponse> {
        let state = self.state().await;

        let descriptor = match RequestDescriptor::from_request(&request, &self.config) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(error = %e, "Request URL not normalizable, passing through");
                return self
                    .config
                    .http_client
                    .execute(request)
                    .await
                    .map_err(OfflineError::Fetch);
            }
        };

        let decision = if state.serves_from_cache() {
            self.policy.decide(&descriptor)
        } else {
            RoutingDecision::Passthrough
        };
        debug!(%state, %decision, "Routing request");

        self.executor.execute(decision, &descriptor, request).await
    }

    async fn set_state(&self, to: LifecycleState) {
        let from = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, to)
        };
        if from == to {
            return;
        }

        debug!(%from, %to, "Lifecycle state changed");
        self.emit(LifecycleEvent::StateChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn emit(&self, event: LifecycleEvent) {
        self.events.emit(CoreEvent::Lifecycle(event)).ok();
    }
}

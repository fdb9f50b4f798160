//! Host event dispatch.
//!
//! [`OfflineWorker`] is what a host runtime talks to: it delivers lifecycle
//! events as [`HostEvent`]s and gets one [`HostReply`] back per event.

use bridge_traits::{HttpRequest, HttpResponse};
use core_async::task::JoinHandle;
use core_runtime::config::OfflineConfig;
use core_runtime::events::EventBus;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::lifecycle::{ActivationReport, LifecycleController, ProvisionReport};
use crate::sync_trigger::{SyncOutcome, SyncProcedure, SyncTrigger};

/// Events a host runtime delivers.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Provision,
    Activate,
    Intercept(HttpRequest),
    /// Background sync signal carrying its tag.
    Sync(String),
}

impl HostEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            HostEvent::Provision => "provision",
            HostEvent::Activate => "activate",
            HostEvent::Intercept(_) => "intercept",
            HostEvent::Sync(_) => "sync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostReply {
    Provisioned(ProvisionReport),
    Activated(ActivationReport),
    Response(HttpResponse),
    Sync(SyncOutcome),
}

pub struct OfflineWorker {
    config: OfflineConfig,
    controller: LifecycleController,
    sync: Arc<SyncTrigger>,
    events: EventBus,
}

impl OfflineWorker {
    pub fn new(config: OfflineConfig, events: EventBus) -> Self {
        let controller = LifecycleController::new(&config, events.clone());
        let sync = Arc::new(SyncTrigger::new(
            config.sync_tags.clone(),
            None,
            events.clone(),
        ));

        info!(
            namespace = %controller.namespace(),
            entries = controller.manifest().len(),
            "Offline worker ready"
        );

        Self {
            config,
            controller,
            sync,
            events,
        }
    }

    /// Register the procedure run for the configured sync tags.
    pub fn with_sync_procedure(mut self, procedure: Arc<dyn SyncProcedure>) -> Self {
        self.sync = Arc::new(SyncTrigger::new(
            self.config.sync_tags.clone(),
            Some(procedure),
            self.events.clone(),
        ));
        self
    }

    /// Dispatch one host event.
    ///
    /// # Errors
    ///
    /// Whatever the handler for the event returns; see
    /// [`LifecycleController`] and [`SyncTrigger::on_sync`].
    pub async fn handle(&self, event: HostEvent) -> Result<HostReply> {
        debug!(event = event.kind(), "Handling host event");
        match event {
            HostEvent::Provision => self
                .controller
                .on_provision()
                .await
                .map(HostReply::Provisioned),
            HostEvent::Activate => self
                .controller
                .on_activate()
                .await
                .map(HostReply::Activated),
            HostEvent::Intercept(request) => self
                .controller
                .on_intercept(request)
                .await
                .map(HostReply::Response),
            HostEvent::Sync(tag) => self.sync.on_sync(&tag).await.map(HostReply::Sync),
        }
    }

    /// Fire sync on reconnection, when a network monitor is configured.
    pub fn start_connectivity_watch(&self) -> Option<JoinHandle<()>> {
        let monitor = self.config.network_monitor.clone()?;
        Some(self.sync.watch_connectivity(monitor))
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn sync_trigger(&self) -> &SyncTrigger {
        &self.sync
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

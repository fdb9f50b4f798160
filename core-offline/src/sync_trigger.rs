//! Background sync trigger.
//!
//! Runs a caller-supplied [`SyncProcedure`] when the host signals that a
//! deferred write queue may be flushed. What the queue holds and how it is
//! filled is the caller's business.

use async_trait::async_trait;
use bridge_traits::NetworkMonitor;
use core_async::sync::Mutex;
use core_async::task::JoinHandle;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{OfflineError, Result};

/// Flushes whatever the application queued while offline.
#[async_trait]
pub trait SyncProcedure: Send + Sync {
    async fn run(&self, tag: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The tag is not registered, nothing ran.
    Ignored,
    Completed,
}

pub struct SyncTrigger {
    tags: Vec<String>,
    procedure: Option<Arc<dyn SyncProcedure>>,
    gate: Mutex<()>,
    events: EventBus,
}

impl SyncTrigger {
    pub fn new(
        tags: Vec<String>,
        procedure: Option<Arc<dyn SyncProcedure>>,
        events: EventBus,
    ) -> Self {
        Self {
            tags,
            procedure,
            gate: Mutex::new(()),
            events,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_armed_for(&self, tag: &str) -> bool {
        self.procedure.is_some() && self.tags.iter().any(|t| t == tag)
    }

    /// Handle one sync signal.
    ///
    /// A recognized tag runs the procedure exactly once. Signals are handled
    /// one at a time.
    ///
    /// # Errors
    ///
    /// [`OfflineError::SyncProcedure`] when the procedure fails. The trigger
    /// stays armed and the next signal runs it again.
    #[instrument(skip(self))]
    pub async fn on_sync(&self, tag: &str) -> Result<SyncOutcome> {
        let procedure = match &self.procedure {
            Some(procedure) if self.tags.iter().any(|t| t == tag) => procedure,
            _ => {
                debug!("No procedure registered for tag, ignoring");
                self.emit(SyncEvent::Ignored {
                    tag: tag.to_string(),
                });
                return Ok(SyncOutcome::Ignored);
            }
        };

        let _gate = self.gate.lock().await;
        self.emit(SyncEvent::Started {
            tag: tag.to_string(),
        });

        match procedure.run(tag).await {
            Ok(()) => {
                info!("Sync procedure completed");
                self.emit(SyncEvent::Completed {
                    tag: tag.to_string(),
                });
                Ok(SyncOutcome::Completed)
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(error = %message, "Sync procedure failed");
                self.emit(SyncEvent::Failed {
                    tag: tag.to_string(),
                    message: message.clone(),
                });
                Err(OfflineError::SyncProcedure {
                    tag: tag.to_string(),
                    message,
                })
            }
        }
    }

    /// Fire the first registered tag whenever connectivity comes back.
    ///
    /// The task ends when the monitor's change stream ends.
    pub fn watch_connectivity(self: &Arc<Self>, monitor: Arc<dyn NetworkMonitor>) -> JoinHandle<()> {
        let trigger = Arc::clone(self);

        core_async::task::spawn(async move {
            let Some(tag) = trigger.tags.first().cloned() else {
                return;
            };

            let mut online = monitor.is_connected().await;
            let mut changes = match monitor.subscribe_changes().await {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(error = %e, "Cannot watch connectivity");
                    return;
                }
            };

            while let Some(info) = changes.next().await {
                let now_online = info.is_connected();
                if now_online && !online {
                    info!(tag = %tag, "Connectivity restored, triggering sync");
                    if let Err(e) = trigger.on_sync(&tag).await {
                        warn!(error = %e, "Sync after reconnect failed");
                    }
                }
                online = now_online;
            }

            debug!("Network change stream ended");
        })
    }

    fn emit(&self, event: SyncEvent) {
        self.events.emit(CoreEvent::Sync(event)).ok();
    }
}

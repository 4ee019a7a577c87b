//! Best-effort owner notifications
//!
//! Registry operations hand events to a [`Notifier`] through
//! [`dispatch_service_created`], which runs delivery on a detached task. The
//! outcome is only logged; it never reaches the caller and is never retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Emitted once per successfully created service
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCreated {
    pub owner_id: String,
    pub service_id: String,
    pub name: String,
    pub public_url: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn service_created(&self, event: &ServiceCreated) -> Result<(), NotifyError>;
}

/// Notifier that only writes the event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn service_created(&self, event: &ServiceCreated) -> Result<(), NotifyError> {
        tracing::info!(
            owner_id = %event.owner_id,
            service_id = %event.service_id,
            public_url = %event.public_url,
            "service '{}' created",
            event.name
        );
        Ok(())
    }
}

/// Fires the notification on a detached task and returns immediately
pub fn dispatch_service_created(notifier: Arc<dyn Notifier>, event: ServiceCreated) {
    tokio::spawn(async move {
        match notifier.service_created(&event).await {
            Ok(()) => tracing::debug!(service_id = %event.service_id, "owner notified"),
            Err(e) => tracing::warn!(
                service_id = %event.service_id,
                error = %e,
                "failed to notify owner, dropping notification"
            ),
        }
    });
}

//! Outbound order events.
//!
//! When `NATS_URL` is configured, domain events are published as JSON so that
//! downstream consumers (notification mailers, analytics) can react to new
//! orders. Publishing is best effort.

use crate::domain::events::OrderEvent;

#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connects to NATS, falling back to a disabled publisher on failure.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "publishing order events to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable; order events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, event: &OrderEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(order_id = %event.order_id(), error = %e, "failed to serialize order event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(order_id = %event.order_id(), subject = event.subject(), error = %e, "failed to publish order event");
        }
    }
}

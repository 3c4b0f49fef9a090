//! Sharing notifications
//!
//! State transitions of the access-request lifecycle are published as
//! [`SharingEvent`]s through an injected [`NotificationSink`]. Delivery is
//! fire-and-forget: a sink never fails the operation that emitted the event.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The other half of a mutual exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePair {
    pub dataset_id: Uuid,
    pub owner_id: Uuid,
}

/// Events emitted by the access-request lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SharingEvent {
    /// A user asked for access to a preview
    #[serde(rename = "access_request", rename_all = "camelCase")]
    AccessRequested {
        dataset_id: Uuid,
        requesting_user_id: Uuid,
        owner_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    AccessGranted {
        dataset_id: Uuid,
        owner_id: Uuid,
        requesting_user_id: Uuid,
        exchange: Option<ExchangePair>,
    },
    #[serde(rename_all = "camelCase")]
    AccessDenied {
        dataset_id: Uuid,
        owner_id: Uuid,
        requesting_user_id: Uuid,
    },
}

impl SharingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SharingEvent::AccessRequested { .. } => "access_request",
            SharingEvent::AccessGranted { .. } => "access_granted",
            SharingEvent::AccessDenied { .. } => "access_denied",
        }
    }
}

/// Destination for sharing events
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: SharingEvent);
}

/// Sink that records events in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: SharingEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "Sharing notification"),
            Err(e) => tracing::warn!(event = event.name(), error = %e, "Unserializable notification"),
        }
    }
}

/// Sink forwarding events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<SharingEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SharingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, event: SharingEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::warn!(event = name, "Notification receiver dropped");
        }
    }
}

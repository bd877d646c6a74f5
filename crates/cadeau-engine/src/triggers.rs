//! Outbound collaborator seams.
//!
//! Fulfillment and notification live outside this core. The engine invokes
//! them through these traits on specific transitions and treats every failure
//! as non-fatal: the gift's persisted state is the source of truth, and
//! downstream effects are reconciled by idempotent retries, never by rolling
//! state back.

use serde_json::Value;
use uuid::Uuid;

/// Kinds of notifications the lifecycle emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A paid gift is waiting for the receiver.
    GiftReceived,
    /// The receiver accepted; sent to the sender.
    GiftAccepted,
    /// The receiver declined; sent to the sender.
    GiftRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::GiftReceived => "gift_received",
            NotificationKind::GiftAccepted => "gift_accepted",
            NotificationKind::GiftRejected => "gift_rejected",
        }
    }
}

/// Creates the physical fulfillment (picking, label, shipment) for an
/// accepted gift.
///
/// Invoked once after acceptance; when it fails the gift stays accepted with
/// no order reference, and [`GiftLifecycle::retry_pending_fulfillments`]
/// re-drives it later. Implementations must therefore tolerate being called
/// again for the same gift.
///
/// [`GiftLifecycle::retry_pending_fulfillments`]: crate::GiftLifecycle::retry_pending_fulfillments
pub trait FulfillmentTrigger {
    /// Returns an opaque order reference on success.
    fn create_fulfillment(&self, gift_id: Uuid, shipping_address_id: Uuid) -> anyhow::Result<String>;
}

/// Delivers a user-facing notification (push, email).  Fire-and-forget:
/// failure never blocks or reverses the transition that emitted it.
pub trait NotificationTrigger {
    fn notify(&self, user_id: Uuid, kind: NotificationKind, payload: &Value) -> anyhow::Result<()>;
}

/// Fulfillment stub that reports an order reference derived from the gift id.
/// Useful for embedding and local development.
#[derive(Debug, Default)]
pub struct NoopFulfillment;

impl FulfillmentTrigger for NoopFulfillment {
    fn create_fulfillment(&self, gift_id: Uuid, _shipping_address_id: Uuid) -> anyhow::Result<String> {
        Ok(format!("noop-{gift_id}"))
    }
}

/// Notification stub that drops everything on the floor.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NotificationTrigger for NoopNotifier {
    fn notify(&self, user_id: Uuid, kind: NotificationKind, _payload: &Value) -> anyhow::Result<()> {
        tracing::debug!(user_id = %user_id, kind = kind.as_str(), "dropping notification");
        Ok(())
    }
}

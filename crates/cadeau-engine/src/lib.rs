//! # cadeau-engine
//!
//! The anonymous-gift core: stock-safe reservations, the gift lifecycle
//! state machine, the anonymous conversation channel and the reveal-gated
//! visibility policy.
//!
//! Every service here is a thin stateless layer over [`cadeau_store::Database`];
//! each inbound call (HTTP request, payment webhook, retry job) is expected to
//! run with its own connection. Mutating entry points take an explicit
//! `acting_user` id; there is no ambient session state.

pub mod channel;
pub mod config;
pub mod lifecycle;
pub mod reservation;
pub mod triggers;
pub mod visibility;

mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::AnonymousChannel;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use lifecycle::{CreateGift, GiftLifecycle};
pub use reservation::LineReservation;
pub use triggers::{FulfillmentTrigger, NotificationKind, NotificationTrigger, NoopFulfillment, NoopNotifier};
pub use visibility::{VisibilityExplanation, VisibilityPolicy};

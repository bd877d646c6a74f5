//! Gift lifecycle states and payment outcome normalization.
//!
//! The state set is closed: `created -> paid -> waiting_acceptance ->
//! {accepted | rejected}`, with `cancelled` reachable from any pre-acceptance
//! state. Transition legality is enforced by the engine; this module only
//! defines the vocabulary and its wire form.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a gift record.
///
/// Stored as lowercase snake_case TEXT in SQLite (see [`GiftState::as_str`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GiftState {
    /// Created by the sender; payment not yet confirmed.
    Created,
    /// Payment confirmed by the upstream gateway.
    Paid,
    /// Receiver has been notified (or a link minted) and may act.
    WaitingAcceptance,
    /// Receiver accepted; terminal for the sender, opens the channel.
    Accepted,
    /// Receiver declined.
    Rejected,
    /// Sender withdrew the gift before acceptance.
    Cancelled,
}

impl GiftState {
    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftState::Created => "created",
            GiftState::Paid => "paid",
            GiftState::WaitingAcceptance => "waiting_acceptance",
            GiftState::Accepted => "accepted",
            GiftState::Rejected => "rejected",
            GiftState::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation back into a state.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(GiftState::Created),
            "paid" => Some(GiftState::Paid),
            "waiting_acceptance" => Some(GiftState::WaitingAcceptance),
            "accepted" => Some(GiftState::Accepted),
            "rejected" => Some(GiftState::Rejected),
            "cancelled" => Some(GiftState::Cancelled),
            _ => None,
        }
    }

    /// States from which the receiver may accept or reject.
    ///
    /// `Paid` is tolerated alongside `WaitingAcceptance` for callers that
    /// raced ahead of the payment projector.
    pub fn actionable_by_receiver(&self) -> bool {
        matches!(self, GiftState::Paid | GiftState::WaitingAcceptance)
    }

    /// States from which the sender may still cancel.
    pub fn cancellable(&self) -> bool {
        matches!(
            self,
            GiftState::Created | GiftState::Paid | GiftState::WaitingAcceptance
        )
    }
}

impl std::fmt::Display for GiftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of an upstream payment callback.
///
/// The gateway reports free-text statuses; only a small set is meaningful to
/// the lifecycle. Everything else is absorbed without a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved,
    Rejected,
    Failed,
    Unknown,
}

impl PaymentOutcome {
    /// Map a raw gateway status string onto a normalized outcome.
    ///
    /// Matching is case-insensitive. `approved`, `success` and `paid` all
    /// count as approval because upstream gateways disagree on vocabulary.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" | "success" | "paid" => PaymentOutcome::Approved,
            "rejected" => PaymentOutcome::Rejected,
            "failed" => PaymentOutcome::Failed,
            _ => PaymentOutcome::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trip() {
        for state in [
            GiftState::Created,
            GiftState::Paid,
            GiftState::WaitingAcceptance,
            GiftState::Accepted,
            GiftState::Rejected,
            GiftState::Cancelled,
        ] {
            assert_eq!(GiftState::parse(state.as_str()), Some(state));
        }
        assert_eq!(GiftState::parse("shipped"), None);
    }

    #[test]
    fn receiver_actionable_states() {
        assert!(GiftState::Paid.actionable_by_receiver());
        assert!(GiftState::WaitingAcceptance.actionable_by_receiver());
        assert!(!GiftState::Created.actionable_by_receiver());
        assert!(!GiftState::Accepted.actionable_by_receiver());
    }

    #[test]
    fn normalize_payment_statuses() {
        assert_eq!(PaymentOutcome::normalize("approved"), PaymentOutcome::Approved);
        assert_eq!(PaymentOutcome::normalize("SUCCESS"), PaymentOutcome::Approved);
        assert_eq!(PaymentOutcome::normalize(" paid "), PaymentOutcome::Approved);
        assert_eq!(PaymentOutcome::normalize("rejected"), PaymentOutcome::Rejected);
        assert_eq!(PaymentOutcome::normalize("failed"), PaymentOutcome::Failed);
        assert_eq!(PaymentOutcome::normalize("on-hold"), PaymentOutcome::Unknown);
        assert_eq!(PaymentOutcome::normalize(""), PaymentOutcome::Unknown);
    }
}

//! The gift lifecycle state machine.
//!
//! Legal transitions:
//!
//! ```text
//! created -> paid -> waiting_acceptance -> accepted
//!                                       -> rejected
//! created | paid | waiting_acceptance   -> cancelled   (sender only)
//! paid | waiting_acceptance             -> created     (payment rejected/failed)
//! ```
//!
//! Every advance is a conditional UPDATE guarded by the states the caller
//! observed, so two racing writers resolve to one winner. Downstream effects
//! of acceptance (channel, fulfillment, notifications) run after the state
//! commit and never roll it back; a failed fulfillment leaves the gift
//! accepted with no order reference, to be reconciled by
//! [`GiftLifecycle::retry_pending_fulfillments`].

use chrono::Utc;
use uuid::Uuid;

use cadeau_shared::constants::{MAX_ALIAS_LEN, MAX_MESSAGE_LEN};
use cadeau_shared::{GiftReceiver, GiftState, LinkToken, PaymentOutcome};
use cadeau_store::{Database, Gift, StoreError};

use crate::channel::AnonymousChannel;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::reservation::LineReservation;
use crate::triggers::{FulfillmentTrigger, NotificationKind, NotificationTrigger};

/// Inputs for [`GiftLifecycle::create`].
#[derive(Debug, Clone)]
pub struct CreateGift {
    pub sender_id: Uuid,
    pub receiver: GiftReceiver,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i64,
    /// The only name the receiver sees before the sender reveals.
    pub sender_alias: String,
    pub sender_message: Option<String>,
}

/// Lifecycle service over one database connection and the outbound
/// collaborator seams.
pub struct GiftLifecycle<'a> {
    db: &'a Database,
    config: EngineConfig,
    fulfillment: &'a dyn FulfillmentTrigger,
    notifier: &'a dyn NotificationTrigger,
}

impl<'a> GiftLifecycle<'a> {
    pub fn new(
        db: &'a Database,
        config: EngineConfig,
        fulfillment: &'a dyn FulfillmentTrigger,
        notifier: &'a dyn NotificationTrigger,
    ) -> Self {
        Self { db, config, fulfillment, notifier }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Validate and persist a new gift in `created`.
    ///
    /// Nothing is written when any validation fails. The stock check sizes
    /// the gift against current availability without reserving a line; the
    /// gift is consumed once, at fulfillment.
    pub fn create(&self, input: CreateGift) -> Result<Gift> {
        let sender_alias = input.sender_alias.trim().to_string();
        if sender_alias.is_empty() {
            return Err(EngineError::Validation("sender alias is required".to_string()));
        }
        if sender_alias.chars().count() > MAX_ALIAS_LEN {
            return Err(EngineError::Validation(format!(
                "sender alias exceeds {MAX_ALIAS_LEN} characters"
            )));
        }
        if let Some(message) = &input.sender_message {
            if message.chars().count() > MAX_MESSAGE_LEN {
                return Err(EngineError::Validation(format!(
                    "sender message exceeds {MAX_MESSAGE_LEN} characters"
                )));
            }
        }
        if input.quantity < 1 {
            return Err(EngineError::Validation("quantity must be at least 1".to_string()));
        }

        self.db.get_user(input.sender_id).map_err(not_found)?;

        let (receiver_id, external_receiver) = match &input.receiver {
            GiftReceiver::Internal(receiver_id) => {
                if *receiver_id == input.sender_id {
                    return Err(EngineError::Validation(
                        "sender and receiver must differ".to_string(),
                    ));
                }
                self.db.get_user(*receiver_id).map_err(not_found)?;
                (Some(*receiver_id), None)
            }
            GiftReceiver::External(ext) => {
                if !ext.has_contact() {
                    return Err(EngineError::Validation(
                        "external receiver needs at least one contact hint".to_string(),
                    ));
                }
                (None, Some(ext.clone()))
            }
        };

        let product = self.db.get_product(input.product_id).map_err(not_found)?;
        if !product.is_active {
            return Err(EngineError::ProductInactive);
        }

        if let Some(variant_id) = input.variant_id {
            let variant = self.db.get_variant(variant_id).map_err(not_found)?;
            if variant.product_id != input.product_id {
                return Err(EngineError::Validation(
                    "variant does not belong to the product".to_string(),
                ));
            }
            if !variant.is_active {
                return Err(EngineError::VariantInactive);
            }
            LineReservation::new(self.db).check_available(variant_id, input.quantity)?;
        }

        let gift = Gift {
            id: Uuid::new_v4(),
            sender_id: input.sender_id,
            receiver_id,
            external_receiver,
            product_id: input.product_id,
            variant_id: input.variant_id,
            quantity: input.quantity,
            sender_alias,
            sender_message: input.sender_message,
            state: GiftState::Created,
            payment_status: None,
            link_token: None,
            conversation_id: None,
            order_id: None,
            shipping_address_id: None,
            created_at: Utc::now(),
            accepted_at: None,
        };
        self.db.insert_gift(&gift)?;

        tracing::info!(gift_id = %gift.id, sender_id = %gift.sender_id, "gift created");

        Ok(gift)
    }

    // ------------------------------------------------------------------
    // Payment callback
    // ------------------------------------------------------------------

    /// The single entry point for upstream payment callbacks.
    ///
    /// Safe under redelivery: the token is minted at most once and the state
    /// advances are guarded, so re-applying an `approved` event to a gift
    /// that already waits for acceptance changes nothing. Unknown statuses
    /// are mirrored and absorbed; this method never fails the caller's
    /// webhook handler over an unrecognized vocabulary.
    pub fn on_payment_event(
        &self,
        gift_id: Uuid,
        status: &str,
        payment_id: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<Gift> {
        let gift = self.db.get_gift(gift_id).map_err(not_found)?;
        self.db.set_payment_status(gift_id, status)?;

        tracing::debug!(
            gift_id = %gift_id,
            status = status,
            payment_id = payment_id.unwrap_or("-"),
            transaction_id = transaction_id.unwrap_or("-"),
            "payment event received"
        );

        match PaymentOutcome::normalize(status) {
            PaymentOutcome::Approved => {
                self.db
                    .advance_state(gift_id, &[GiftState::Created], GiftState::Paid)?;

                // Mint only for open gifts; a late approval for a settled
                // gift must not hand out a live link.
                if gift.receiver_id.is_none() && gift.state.cancellable() {
                    // External receiver: entry is by possession of the link.
                    if gift.link_token.is_none() {
                        let token = LinkToken::mint();
                        if self.db.set_link_token_if_absent(gift_id, token.as_str())? {
                            tracing::info!(
                                gift_id = %gift_id,
                                link = %self.config.acceptance_link(token.as_str()),
                                "minted acceptance link"
                            );
                        }
                    }
                }

                let newly_waiting = self.db.advance_state(
                    gift_id,
                    &[GiftState::Paid],
                    GiftState::WaitingAcceptance,
                )?;

                // Internal receiver: a direct notification is the entry point.
                if newly_waiting {
                    if let Some(receiver_id) = gift.receiver_id {
                        self.send(receiver_id, NotificationKind::GiftReceived, &gift);
                    }
                }
            }
            PaymentOutcome::Rejected | PaymentOutcome::Failed => {
                let reverted = self.db.advance_state(
                    gift_id,
                    &[GiftState::Paid, GiftState::WaitingAcceptance],
                    GiftState::Created,
                )?;
                if reverted {
                    tracing::info!(gift_id = %gift_id, status = status, "payment failed, gift reopened for retry");
                }
            }
            PaymentOutcome::Unknown => {
                tracing::warn!(gift_id = %gift_id, status = status, "unknown payment status absorbed");
            }
        }

        Ok(self.db.get_gift(gift_id)?)
    }

    // ------------------------------------------------------------------
    // Receiver actions
    // ------------------------------------------------------------------

    /// Accept a gift, binding it to the acting user and shipping address.
    ///
    /// Once the state write commits the acceptance is irreversible; channel
    /// creation, fulfillment and notifications run afterwards and their
    /// failures are logged, not propagated.
    pub fn accept(
        &self,
        gift_id: Uuid,
        acting_user: Uuid,
        shipping_address_id: Uuid,
    ) -> Result<Gift> {
        let gift = self.db.get_gift(gift_id).map_err(not_found)?;

        if gift.sender_id == acting_user {
            return Err(EngineError::Forbidden);
        }
        if let Some(bound) = gift.receiver_id {
            if bound != acting_user {
                return Err(EngineError::Forbidden);
            }
        }
        if !gift.state.actionable_by_receiver() {
            return Err(EngineError::InvalidTransition {
                from: gift.state,
                attempted: GiftState::Accepted,
            });
        }

        let address = match self.db.get_address(shipping_address_id) {
            Ok(a) => a,
            Err(StoreError::NotFound) => return Err(EngineError::AddressRequired),
            Err(e) => return Err(e.into()),
        };
        if address.user_id != acting_user {
            return Err(EngineError::AddressRequired);
        }

        let accepted = self
            .db
            .accept_gift(gift_id, acting_user, shipping_address_id, Utc::now())?;
        if !accepted {
            // The guard missed: the gift moved after our read.
            return Err(EngineError::StaleState);
        }

        tracing::info!(gift_id = %gift_id, receiver_id = %acting_user, "gift accepted");

        // Downstream effects; each failure is isolated and logged.
        match AnonymousChannel::new(self.db, self.config.clone()).open_or_get(gift_id) {
            Ok(conversation) => {
                tracing::debug!(gift_id = %gift_id, conversation_id = %conversation.id, "channel ready");
            }
            Err(e) => {
                tracing::error!(gift_id = %gift_id, error = %e, "channel creation failed after acceptance");
            }
        }

        match self.fulfillment.create_fulfillment(gift_id, shipping_address_id) {
            Ok(order_ref) => {
                if let Err(e) = self.db.set_order_id(gift_id, &order_ref) {
                    tracing::error!(gift_id = %gift_id, error = %e, "failed to record order reference");
                }
            }
            Err(e) => {
                tracing::warn!(
                    gift_id = %gift_id,
                    error = %e,
                    "fulfillment trigger failed, gift left for retry job"
                );
            }
        }

        self.send(gift.sender_id, NotificationKind::GiftAccepted, &gift);

        Ok(self.db.get_gift(gift_id)?)
    }

    /// Reject a gift.  Only the bound receiver (or, for an external gift,
    /// any candidate who is not the sender) may reject.
    pub fn reject(&self, gift_id: Uuid, acting_user: Uuid) -> Result<Gift> {
        let gift = self.db.get_gift(gift_id).map_err(not_found)?;

        if gift.sender_id == acting_user {
            return Err(EngineError::Forbidden);
        }
        if let Some(bound) = gift.receiver_id {
            if bound != acting_user {
                return Err(EngineError::Forbidden);
            }
        }
        if !gift.state.actionable_by_receiver() {
            return Err(EngineError::InvalidTransition {
                from: gift.state,
                attempted: GiftState::Rejected,
            });
        }

        let rejected = self.db.advance_state(
            gift_id,
            &[GiftState::Paid, GiftState::WaitingAcceptance],
            GiftState::Rejected,
        )?;
        if !rejected {
            return Err(EngineError::StaleState);
        }

        tracing::info!(gift_id = %gift_id, "gift rejected");

        self.send(gift.sender_id, NotificationKind::GiftRejected, &gift);

        Ok(self.db.get_gift(gift_id)?)
    }

    /// Withdraw a gift before acceptance.  Sender only.
    pub fn cancel(&self, gift_id: Uuid, acting_user: Uuid) -> Result<Gift> {
        let gift = self.db.get_gift(gift_id).map_err(not_found)?;

        if gift.sender_id != acting_user {
            return Err(EngineError::Forbidden);
        }
        if !gift.state.cancellable() {
            return Err(EngineError::InvalidTransition {
                from: gift.state,
                attempted: GiftState::Cancelled,
            });
        }

        let cancelled = self.db.advance_state(
            gift_id,
            &[GiftState::Created, GiftState::Paid, GiftState::WaitingAcceptance],
            GiftState::Cancelled,
        )?;
        if !cancelled {
            return Err(EngineError::StaleState);
        }

        tracing::info!(gift_id = %gift_id, "gift cancelled by sender");

        Ok(self.db.get_gift(gift_id)?)
    }

    // ------------------------------------------------------------------
    // Lookups & reconciliation
    // ------------------------------------------------------------------

    /// Resolve an acceptance link token to its gift.
    pub fn gift_by_token(&self, token: &str) -> Result<Gift> {
        let token = LinkToken::parse(token)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        self.db.get_gift_by_token(token.as_str()).map_err(not_found)
    }

    /// The shareable acceptance link for a gift, when a token exists.
    pub fn acceptance_link(&self, gift: &Gift) -> Option<String> {
        gift.link_token
            .as_deref()
            .map(|t| self.config.acceptance_link(t))
    }

    /// Re-drive fulfillment for accepted gifts with no order reference.
    ///
    /// Intended to run from an out-of-band job. Returns how many gifts got an
    /// order reference this pass.
    pub fn retry_pending_fulfillments(&self) -> Result<usize> {
        let pending = self.db.gifts_awaiting_fulfillment()?;
        let mut fulfilled = 0;

        for gift in pending {
            let Some(address_id) = gift.shipping_address_id else {
                tracing::warn!(gift_id = %gift.id, "accepted gift has no shipping address, skipping");
                continue;
            };
            match self.fulfillment.create_fulfillment(gift.id, address_id) {
                Ok(order_ref) => {
                    self.db.set_order_id(gift.id, &order_ref)?;
                    fulfilled += 1;
                }
                Err(e) => {
                    tracing::warn!(gift_id = %gift.id, error = %e, "fulfillment retry failed");
                }
            }
        }

        Ok(fulfilled)
    }

    /// Fire-and-forget notification; failure is logged and swallowed.
    fn send(&self, user_id: Uuid, kind: NotificationKind, gift: &Gift) {
        let payload = serde_json::json!({
            "gift_id": gift.id.to_string(),
            "sender_alias": gift.sender_alias,
        });
        if let Err(e) = self.notifier.notify(user_id, kind, &payload) {
            tracing::warn!(
                gift_id = %gift.id,
                user_id = %user_id,
                kind = kind.as_str(),
                error = %e,
                "notification delivery failed"
            );
        }
    }
}

/// Collapse a store miss into the engine's NotFound.
fn not_found(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound => EngineError::NotFound,
        other => EngineError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadeau_shared::ExternalReceiver;

    use crate::testutil::{RecordingNotifier, ScriptedFulfillment, TestWorld};

    struct Fixture {
        world: TestWorld,
        fulfillment: ScriptedFulfillment,
        notifier: RecordingNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: TestWorld::new(),
                fulfillment: ScriptedFulfillment::succeeding(),
                notifier: RecordingNotifier::default(),
            }
        }

        fn lifecycle(&self) -> GiftLifecycle<'_> {
            GiftLifecycle::new(
                &self.world.db,
                EngineConfig::default(),
                &self.fulfillment,
                &self.notifier,
            )
        }

        fn external_input(&self, sender_id: Uuid, variant_id: Uuid, quantity: i64) -> CreateGift {
            CreateGift {
                sender_id,
                receiver: GiftReceiver::External(ExternalReceiver {
                    email: Some("mystery@example.org".to_string()),
                    ..Default::default()
                }),
                product_id: self.world.db.get_variant(variant_id).unwrap().product_id,
                variant_id: Some(variant_id),
                quantity,
                sender_alias: "A secret admirer".to_string(),
                sender_message: Some("Enjoy!".to_string()),
            }
        }
    }

    #[test]
    fn create_sets_exactly_one_receiver_mode() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let receiver = fx.world.user("receiver");
        let (product, variant) = fx.world.stocked_variant(5);

        let internal = fx
            .lifecycle()
            .create(CreateGift {
                sender_id: sender.id,
                receiver: GiftReceiver::Internal(receiver.id),
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 1,
                sender_alias: "Workmate".to_string(),
                sender_message: None,
            })
            .unwrap();
        assert_eq!(internal.receiver_id, Some(receiver.id));
        assert!(internal.external_receiver.is_none());

        let external = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        assert!(external.receiver_id.is_none());
        assert!(external.external_receiver.is_some());
    }

    #[test]
    fn create_rejects_contactless_external_receiver() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (product, variant) = fx.world.stocked_variant(5);

        let result = fx.lifecycle().create(CreateGift {
            sender_id: sender.id,
            receiver: GiftReceiver::External(ExternalReceiver::default()),
            product_id: product.id,
            variant_id: Some(variant.id),
            quantity: 1,
            sender_alias: "Someone".to_string(),
            sender_message: None,
        });

        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(fx.world.db.gifts_for_sender(sender.id).unwrap().is_empty());
    }

    #[test]
    fn create_rejects_self_gift_and_blank_alias() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (product, variant) = fx.world.stocked_variant(5);

        let self_gift = fx.lifecycle().create(CreateGift {
            sender_id: sender.id,
            receiver: GiftReceiver::Internal(sender.id),
            product_id: product.id,
            variant_id: Some(variant.id),
            quantity: 1,
            sender_alias: "Me".to_string(),
            sender_message: None,
        });
        assert!(matches!(self_gift, Err(EngineError::Validation(_))));

        let mut blank = fx.external_input(sender.id, variant.id, 1);
        blank.sender_alias = "   ".to_string();
        assert!(matches!(
            fx.lifecycle().create(blank),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn create_fails_on_insufficient_stock_and_persists_nothing() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(1);

        let result = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 2));

        assert!(matches!(
            result,
            Err(EngineError::InsufficientStock { requested: 2, available: 1 })
        ));
        assert!(fx.world.db.gifts_for_sender(sender.id).unwrap().is_empty());
    }

    #[test]
    fn approved_event_mints_token_exactly_once() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();

        let first = fx
            .lifecycle()
            .on_payment_event(gift.id, "approved", Some("pay-1"), None)
            .unwrap();
        assert_eq!(first.state, GiftState::WaitingAcceptance);
        let token = first.link_token.clone().expect("token minted");

        // Redelivery of the same event is a no-op on token and state.
        let second = fx
            .lifecycle()
            .on_payment_event(gift.id, "approved", Some("pay-1"), None)
            .unwrap();
        assert_eq!(second.state, GiftState::WaitingAcceptance);
        assert_eq!(second.link_token.as_deref(), Some(token.as_str()));

        // The lookup by token resolves the gift.
        let resolved = fx.lifecycle().gift_by_token(&token).unwrap();
        assert_eq!(resolved.id, gift.id);
        assert_eq!(
            fx.lifecycle().acceptance_link(&second),
            Some(EngineConfig::default().acceptance_link(&token))
        );
    }

    #[test]
    fn approved_event_notifies_internal_receiver_without_token() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let receiver = fx.world.user("receiver");
        let (product, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(CreateGift {
                sender_id: sender.id,
                receiver: GiftReceiver::Internal(receiver.id),
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 1,
                sender_alias: "Old friend".to_string(),
                sender_message: None,
            })
            .unwrap();

        let updated = fx
            .lifecycle()
            .on_payment_event(gift.id, "success", None, None)
            .unwrap();
        assert_eq!(updated.state, GiftState::WaitingAcceptance);
        assert!(updated.link_token.is_none());

        fx.lifecycle()
            .on_payment_event(gift.id, "success", None, None)
            .unwrap();

        let sent = fx.notifier.sent.lock().unwrap();
        let received: Vec<_> = sent
            .iter()
            .filter(|(user, kind)| *user == receiver.id && *kind == NotificationKind::GiftReceived)
            .collect();
        assert_eq!(received.len(), 1, "redelivery must not re-notify");
    }

    #[test]
    fn failed_payment_reopens_the_gift() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();

        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();
        let reopened = fx
            .lifecycle()
            .on_payment_event(gift.id, "failed", None, None)
            .unwrap();

        assert_eq!(reopened.state, GiftState::Created);
        assert_eq!(reopened.payment_status.as_deref(), Some("failed"));

        // The sender may retry payment.
        let retried = fx
            .lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();
        assert_eq!(retried.state, GiftState::WaitingAcceptance);
    }

    #[test]
    fn unknown_status_is_absorbed_without_transition() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();

        let updated = fx
            .lifecycle()
            .on_payment_event(gift.id, "on-hold", None, None)
            .unwrap();

        assert_eq!(updated.state, GiftState::Created);
        assert_eq!(updated.payment_status.as_deref(), Some("on-hold"));
    }

    #[test]
    fn accept_binds_receiver_and_fires_downstream() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let claimant = fx.world.user("claimant");
        let address = fx.world.address_for(claimant.id);

        let accepted = fx.lifecycle().accept(gift.id, claimant.id, address.id).unwrap();

        assert_eq!(accepted.state, GiftState::Accepted);
        assert_eq!(accepted.receiver_id, Some(claimant.id));
        assert!(accepted.accepted_at.is_some());
        assert!(accepted.conversation_id.is_some());
        assert_eq!(accepted.order_id.as_deref(), Some(format!("order-{}", gift.id).as_str()));
        assert_eq!(accepted.shipping_address_id, Some(address.id));

        let sent = fx.notifier.sent.lock().unwrap();
        assert!(sent.contains(&(sender.id, NotificationKind::GiftAccepted)));
    }

    #[test]
    fn accept_without_owned_address_reports_address_required() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let claimant = fx.world.user("claimant");

        // No address at all.
        let result = fx.lifecycle().accept(gift.id, claimant.id, Uuid::new_v4());
        assert!(matches!(result, Err(EngineError::AddressRequired)));

        // An address owned by someone else does not count either.
        let stranger = fx.world.user("stranger");
        let foreign = fx.world.address_for(stranger.id);
        let result = fx.lifecycle().accept(gift.id, claimant.id, foreign.id);
        assert!(matches!(result, Err(EngineError::AddressRequired)));

        assert_eq!(
            fx.world.db.get_gift(gift.id).unwrap().state,
            GiftState::WaitingAcceptance
        );
    }

    #[test]
    fn second_accept_sees_exactly_one_winner() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let claimant = fx.world.user("claimant");
        let address = fx.world.address_for(claimant.id);

        // Two units of work on distinct connections, as two requests would be.
        let other_db = fx.world.second_handle();
        let other_fulfillment = ScriptedFulfillment::succeeding();
        let other_notifier = RecordingNotifier::default();
        let other_lifecycle = GiftLifecycle::new(
            &other_db,
            EngineConfig::default(),
            &other_fulfillment,
            &other_notifier,
        );

        let first = fx.lifecycle().accept(gift.id, claimant.id, address.id).unwrap();
        let second = other_lifecycle.accept(gift.id, claimant.id, address.id);

        assert!(matches!(
            second,
            Err(EngineError::InvalidTransition { .. }) | Err(EngineError::StaleState)
        ));
        let final_gift = fx.world.db.get_gift(gift.id).unwrap();
        assert_eq!(final_gift.conversation_id, first.conversation_id);
    }

    #[test]
    fn acceptance_survives_fulfillment_failure() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let claimant = fx.world.user("claimant");
        let address = fx.world.address_for(claimant.id);

        let failing = ScriptedFulfillment::failing();
        let notifier = RecordingNotifier::default();
        let lifecycle =
            GiftLifecycle::new(&fx.world.db, EngineConfig::default(), &failing, &notifier);

        let accepted = lifecycle.accept(gift.id, claimant.id, address.id).unwrap();
        assert_eq!(accepted.state, GiftState::Accepted);
        assert!(accepted.order_id.is_none());
        assert!(accepted.conversation_id.is_some());

        // The reconciliation job picks the gift up and records the order.
        let retried = fx.lifecycle().retry_pending_fulfillments().unwrap();
        assert_eq!(retried, 1);
        let fulfilled = fx.world.db.get_gift(gift.id).unwrap();
        assert_eq!(
            fulfilled.order_id.as_deref(),
            Some(format!("order-{}", gift.id).as_str())
        );
        assert_eq!(fx.lifecycle().retry_pending_fulfillments().unwrap(), 0);
    }

    #[test]
    fn reject_by_sender_is_forbidden() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let result = fx.lifecycle().reject(gift.id, sender.id);
        assert!(matches!(result, Err(EngineError::Forbidden)));
        assert_eq!(
            fx.world.db.get_gift(gift.id).unwrap().state,
            GiftState::WaitingAcceptance
        );
    }

    #[test]
    fn reject_by_receiver_notifies_sender() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let receiver = fx.world.user("receiver");
        let (product, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(CreateGift {
                sender_id: sender.id,
                receiver: GiftReceiver::Internal(receiver.id),
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 1,
                sender_alias: "Cousin".to_string(),
                sender_message: None,
            })
            .unwrap();
        fx.lifecycle()
            .on_payment_event(gift.id, "approved", None, None)
            .unwrap();

        let rejected = fx.lifecycle().reject(gift.id, receiver.id).unwrap();
        assert_eq!(rejected.state, GiftState::Rejected);

        let sent = fx.notifier.sent.lock().unwrap();
        assert!(sent.contains(&(sender.id, NotificationKind::GiftRejected)));
    }

    #[test]
    fn cancel_rules() {
        let fx = Fixture::new();
        let sender = fx.world.user("sender");
        let (_, variant) = fx.world.stocked_variant(5);
        let gift = fx
            .lifecycle()
            .create(fx.external_input(sender.id, variant.id, 1))
            .unwrap();

        // Not the sender.
        let other = fx.world.user("other");
        assert!(matches!(
            fx.lifecycle().cancel(gift.id, other.id),
            Err(EngineError::Forbidden)
        ));

        // Sender cancels from created.
        let cancelled = fx.lifecycle().cancel(gift.id, sender.id).unwrap();
        assert_eq!(cancelled.state, GiftState::Cancelled);

        // Never from a settled state.
        assert!(matches!(
            fx.lifecycle().cancel(gift.id, sender.id),
            Err(EngineError::InvalidTransition { .. })
        ));
    }
}

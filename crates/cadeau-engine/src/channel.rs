//! The anonymous conversation channel between sender and receiver.
//!
//! Opened once per accepted gift; repeat calls return the same conversation.
//! The gift-state precondition (accepted, receiver bound) is the lifecycle's
//! responsibility, not re-checked here.

use uuid::Uuid;

use cadeau_store::{Conversation, Database, Participant, StoreError};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Channel service over one database connection.
pub struct AnonymousChannel<'a> {
    db: &'a Database,
    config: EngineConfig,
}

impl<'a> AnonymousChannel<'a> {
    pub fn new(db: &'a Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Open the gift's conversation, or return the existing one.
    ///
    /// Idempotent: acceptance retries converge on a single conversation. The
    /// sender's participant row carries the gift alias; the receiver starts
    /// under a generic placeholder. Both sides start unrevealed.
    pub fn open_or_get(&self, gift_id: Uuid) -> Result<Conversation> {
        let gift = match self.db.get_gift(gift_id) {
            Ok(g) => g,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        };

        if let Some(conversation_id) = gift.conversation_id {
            return Ok(self.db.get_conversation(conversation_id)?);
        }

        let receiver_id = gift.receiver_id.ok_or_else(|| {
            EngineError::Validation("gift has no bound receiver".to_string())
        })?;

        Ok(self.db.open_gift_conversation(
            gift.id,
            gift.sender_id,
            &gift.sender_alias,
            receiver_id,
            &self.config.receiver_alias,
        )?)
    }

    /// Reveal the acting user's real identity to the other side.
    ///
    /// One-way and user-initiated; there is no un-reveal.
    pub fn reveal_identity(&self, gift_id: Uuid, acting_user: Uuid) -> Result<Participant> {
        let gift = match self.db.get_gift(gift_id) {
            Ok(g) => g,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let Some(conversation_id) = gift.conversation_id else {
            return Err(EngineError::NoConversation);
        };

        if acting_user != gift.sender_id && gift.receiver_id != Some(acting_user) {
            return Err(EngineError::NotParticipant);
        }

        if !self.db.set_participant_revealed(conversation_id, acting_user)? {
            return Err(EngineError::NotParticipant);
        }

        tracing::info!(
            gift_id = %gift_id,
            conversation_id = %conversation_id,
            user_id = %acting_user,
            "participant revealed identity"
        );

        Ok(self.db.get_participant(conversation_id, acting_user)?)
    }
}

//! The reveal-gated profile visibility policy.
//!
//! Whether viewer A may see participant B's real profile is decided by B's
//! reveal flag and nothing else. An existing friendship between the two users
//! never grants visibility; it appears in [`VisibilityExplanation`] as a
//! diagnostic field only.

use serde::Serialize;
use uuid::Uuid;

use cadeau_store::{Database, StoreError};

use crate::error::{EngineError, Result};

/// Visibility decision plus the auxiliary facts a UI may want to render.
#[derive(Debug, Clone, Serialize)]
pub struct VisibilityExplanation {
    /// The decision: may the viewer see the counterpart's real profile.
    pub visible: bool,
    pub conversation_exists: bool,
    /// Whether the viewer has revealed themselves to the other side.
    pub viewer_revealed: bool,
    /// Whether the counterpart has revealed themselves to the viewer.
    pub other_revealed: bool,
    /// Informational only; never load-bearing for `visible`.
    pub are_friends: bool,
    pub reason: String,
}

/// Policy over one database connection.
pub struct VisibilityPolicy<'a> {
    db: &'a Database,
}

impl<'a> VisibilityPolicy<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// May `viewer` see the other participant's real profile?
    ///
    /// `false` when the gift has no conversation yet, when the viewer is not
    /// a participant, and when the counterpart has not revealed. The flag
    /// consulted is the counterpart's, never the viewer's own.
    pub fn can_view(&self, gift_id: Uuid, viewer: Uuid) -> Result<bool> {
        Ok(self.resolve(gift_id, viewer)?.visible)
    }

    /// The decision plus diagnostics for UI purposes.
    pub fn explain(&self, gift_id: Uuid, viewer: Uuid) -> Result<VisibilityExplanation> {
        self.resolve(gift_id, viewer)
    }

    fn resolve(&self, gift_id: Uuid, viewer: Uuid) -> Result<VisibilityExplanation> {
        let gift = match self.db.get_gift(gift_id) {
            Ok(g) => g,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let Some(conversation_id) = gift.conversation_id else {
            return Ok(VisibilityExplanation {
                visible: false,
                conversation_exists: false,
                viewer_revealed: false,
                other_revealed: false,
                are_friends: false,
                reason: "no conversation yet".to_string(),
            });
        };

        let participants = self.db.participants(conversation_id)?;
        let viewer_row = participants.iter().find(|p| p.user_id == viewer);
        let other_row = participants.iter().find(|p| p.user_id != viewer);

        let Some(viewer_row) = viewer_row else {
            return Ok(VisibilityExplanation {
                visible: false,
                conversation_exists: true,
                viewer_revealed: false,
                other_revealed: false,
                are_friends: false,
                reason: "viewer is not a participant".to_string(),
            });
        };

        let other_revealed = other_row.map(|o| o.is_revealed).unwrap_or(false);
        let are_friends = match other_row {
            Some(other) => self.db.are_friends(viewer, other.user_id)?,
            None => false,
        };

        let reason = if other_revealed {
            "counterpart has revealed their identity".to_string()
        } else {
            "counterpart has not revealed their identity".to_string()
        };

        Ok(VisibilityExplanation {
            visible: other_revealed,
            conversation_exists: true,
            viewer_revealed: viewer_row.is_revealed,
            other_revealed,
            are_friends,
            reason,
        })
    }
}

//! Receiver addressing for a gift.
//!
//! A gift is addressed either to a registered user (by id) or to an external
//! person known only by contact hints. The two modes are mutually exclusive
//! by construction; an external receiver is bound to a real account only at
//! acceptance time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contact hints for a receiver who is not (yet) a registered user.
///
/// A closed set of optional fields rather than an open map, so validation
/// stays total. At least one hint must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalReceiver {
    /// Social handle on some external network.
    pub handle: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Name shown to the sender while composing the gift.
    pub display_name: Option<String>,
}

impl ExternalReceiver {
    /// True when at least one contact hint is a non-empty string.
    pub fn has_contact(&self) -> bool {
        [&self.handle, &self.email, &self.phone, &self.display_name]
            .iter()
            .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// Exactly one receiver mode per gift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GiftReceiver {
    /// A registered user, addressed by id.
    Internal(Uuid),
    /// An external person, addressed by contact hints until acceptance.
    External(ExternalReceiver),
}

impl GiftReceiver {
    pub fn is_internal(&self) -> bool {
        matches!(self, GiftReceiver::Internal(_))
    }

    /// The bound user id, when the receiver is internal.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            GiftReceiver::Internal(id) => Some(*id),
            GiftReceiver::External(_) => None,
        }
    }
}

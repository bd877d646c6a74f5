//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to an API or UI layer.

use cadeau_shared::{ExternalReceiver, GiftState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered platform user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A shipping address owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Name of the person the parcel is addressed to.
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A purchasable product; read-mostly from the engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A purchasable SKU of a product.
///
/// Available stock is never stored on the variant; it is recomputed from
/// `warehouse_stock` on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub label: String,
    pub is_active: bool,
    pub base_price_cents: i64,
    pub suggested_price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One warehouse's stock counter for a variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockRecord {
    pub id: Uuid,
    pub warehouse: String,
    pub variant_id: Uuid,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

/// A cart or ephemeral gift-checkout holder of reservation lines.
///
/// The id is always assigned by the store; guest containers (no owner) are
/// valid and may later be adopted by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One (container, variant, quantity) reservation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationLine {
    pub id: Uuid,
    pub container_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gift
// ---------------------------------------------------------------------------

/// The durable anonymous-gift transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gift {
    pub id: Uuid,
    pub sender_id: Uuid,
    /// Bound user; `None` for an external gift until acceptance binds one.
    pub receiver_id: Option<Uuid>,
    /// Contact hints; `Some` only when the gift was addressed externally.
    pub external_receiver: Option<ExternalReceiver>,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i64,
    /// The only name the receiver sees before the sender reveals.
    pub sender_alias: String,
    pub sender_message: Option<String>,
    pub state: GiftState,
    /// Raw status string from the last payment callback, mirrored verbatim.
    pub payment_status: Option<String>,
    pub link_token: Option<String>,
    pub conversation_id: Option<Uuid>,
    pub order_id: Option<String>,
    pub shipping_address_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Kind discriminator for conversations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    AnonymousGift,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::AnonymousGift => "anonymous_gift",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(ConversationKind::Direct),
            "anonymous_gift" => Some(ConversationKind::AnonymousGift),
            _ => None,
        }
    }
}

/// A conversation between users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub created_at: DateTime<Utc>,
}

/// One side of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    /// Name shown to the other side while unrevealed.
    pub display_alias: String,
    /// One-way flag; once set it never reverts.
    pub is_revealed: bool,
    pub joined_at: DateTime<Utc>,
}

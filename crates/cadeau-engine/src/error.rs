use cadeau_shared::GiftState;
use thiserror::Error;

/// Errors produced by the gift engine.
///
/// Every business-rule failure is its own kind so a caller can render the
/// correct next action (retry stock, capture an address, show "already
/// handled") instead of a generic failure page.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad input shape; rejected before any write.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Not enough stock to cover the request.  Recoverable; the caller
    /// re-renders and lets the user retry.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The variant is disabled for purchase.
    #[error("Variant is not active")]
    VariantInactive,

    /// The product is disabled for purchase.
    #[error("Product is not active")]
    ProductInactive,

    /// No such reservation line in this container.
    #[error("Reservation line not found")]
    LineNotFound,

    /// The requested transition is not legal from the gift's current state.
    #[error("Invalid transition: gift is {from}, cannot move to {attempted}")]
    InvalidTransition { from: GiftState, attempted: GiftState },

    /// The record moved between read and write; re-read and retry.
    #[error("State changed concurrently, re-read and retry")]
    StaleState,

    /// The acting user has no usable shipping address for this acceptance.
    /// Distinct from validation so the UI can branch to address capture.
    #[error("A shipping address is required to accept")]
    AddressRequired,

    /// The acting user is not a participant of the gift's conversation.
    #[error("Not a participant of this conversation")]
    NotParticipant,

    /// The gift has no conversation yet.
    #[error("Gift has no conversation")]
    NoConversation,

    /// The acting user may not perform this operation on this gift.
    #[error("Forbidden")]
    Forbidden,

    /// Referenced record does not exist.
    #[error("Record not found")]
    NotFound,

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(#[from] cadeau_store::StoreError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

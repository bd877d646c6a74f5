/// Application name
pub const APP_NAME: &str = "Cadeau";

/// Random bytes in an acceptance link token (before base64url encoding)
pub const LINK_TOKEN_SIZE: usize = 32;

/// Alias shown for the receiver side of an anonymous-gift conversation
/// until the receiver chooses to reveal their identity
pub const RECEIVER_PLACEHOLDER_ALIAS: &str = "Gift recipient";

/// Maximum length of a sender alias in characters
pub const MAX_ALIAS_LEN: usize = 64;

/// Maximum length of the optional sender message in characters
pub const MAX_MESSAGE_LEN: usize = 2_000;

/// Default base URL for shareable acceptance links
pub const DEFAULT_LINK_BASE_URL: &str = "https://cadeau.app/g";

//! Acceptance link tokens.
//!
//! When a gift is addressed to an external receiver, payment approval mints a
//! single-use token embedded in a shareable link. Possession of the token is
//! the receiver's proof of entitlement: the token is stored against the gift
//! under a unique index and resolved by exact lookup, so no signature is
//! needed (unlike channel invites, which travel between peers unattested).

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::LINK_TOKEN_SIZE;

/// An opaque, URL-safe acceptance token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkToken(String);

impl LinkToken {
    /// Mint a fresh token from OS randomness.
    pub fn mint() -> Self {
        let mut bytes = [0u8; LINK_TOKEN_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(base64_url_encode(&bytes))
    }

    /// Re-validate a token string received from a link.
    ///
    /// Only the shape is checked here; whether the token matches a gift is a
    /// store lookup.
    pub fn parse(code: &str) -> Result<Self, TokenError> {
        let trimmed = code.trim();
        let bytes = base64_url_decode(trimmed)?;
        if bytes.len() != LINK_TOKEN_SIZE {
            return Err(TokenError::WrongLength(bytes.len()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LinkToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is not valid base64url")]
    Base64Decode,

    #[error("Token decodes to {0} bytes, expected {LINK_TOKEN_SIZE}")]
    WrongLength(usize),
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, TokenError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.decode(s).map_err(|_| TokenError::Base64Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_parse_round_trip() {
        let token = LinkToken::mint();
        let parsed = LinkToken::parse(token.as_str()).expect("freshly minted token should parse");
        assert_eq!(parsed, token);
    }

    #[test]
    fn minted_tokens_are_unique() {
        let a = LinkToken::mint();
        let b = LinkToken::mint();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            LinkToken::parse("not/base64url!"),
            Err(TokenError::Base64Decode)
        ));
    }

    #[test]
    fn rejects_short_tokens() {
        assert!(matches!(
            LinkToken::parse("YWJjZA"),
            Err(TokenError::WrongLength(4))
        ));
    }
}

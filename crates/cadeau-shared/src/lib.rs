//! # cadeau-shared
//!
//! Domain vocabulary shared by the Cadeau gift engine and its storage layer:
//! gift lifecycle states, normalized payment outcomes, receiver addressing
//! modes, and the acceptance link token format.
//!
//! This crate is deliberately free of persistence and I/O so that both the
//! store and the engine can depend on it without cycles.

pub mod constants;
pub mod receiver;
pub mod state;
pub mod token;

pub use receiver::{ExternalReceiver, GiftReceiver};
pub use state::{GiftState, PaymentOutcome};
pub use token::{LinkToken, TokenError};

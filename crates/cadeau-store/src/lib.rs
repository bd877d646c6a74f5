//! # cadeau-store
//!
//! Durable storage for the Cadeau gift engine, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. Correctness-critical writes (reservation merges, gift state
//! transitions, channel creation) are expressed as atomic upserts,
//! conditional updates, or transactions so that concurrent connections to
//! the same database file cannot corrupt the core invariants.

pub mod addresses;
pub mod catalog;
pub mod conversations;
pub mod database;
pub mod gifts;
pub mod migrations;
pub mod models;
pub mod reservations;
pub mod social;
pub mod stock;

mod error;
mod util;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

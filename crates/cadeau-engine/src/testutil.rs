//! Shared fixtures for the engine's unit tests.

use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use cadeau_store::addresses::NewAddress;
use cadeau_store::{Address, Database, Product, User, Variant};

use crate::triggers::{FulfillmentTrigger, NotificationKind, NotificationTrigger};

/// A temp-dir database that lives for the duration of one test.
pub(crate) struct TestWorld {
    // Held so the backing directory outlives the connection.
    _dir: tempfile::TempDir,
    pub db: Database,
}

impl TestWorld {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        Self { _dir: dir, db }
    }

    /// A second connection to the same database file, for tests that model
    /// two concurrent units of work.
    pub fn second_handle(&self) -> Database {
        Database::open_at(&self.db.path().unwrap()).unwrap()
    }

    pub fn user(&self, name: &str) -> User {
        self.db.create_user(name).unwrap()
    }

    pub fn address_for(&self, user_id: Uuid) -> Address {
        self.db
            .create_address(NewAddress {
                user_id,
                recipient: "Recipient",
                line1: "5 quai des Brumes",
                city: "Nantes",
                postal_code: "44000",
                country: "FR",
            })
            .unwrap()
    }

    /// An active product with one active variant stocked at `stock` units.
    pub fn stocked_variant(&self, stock: i64) -> (Product, Variant) {
        let product = self.db.create_product("Boxed chocolates", true).unwrap();
        let variant = self
            .db
            .create_variant(product.id, "dark 24pc", 2_400, Some(2_900))
            .unwrap();
        self.db.set_stock("central", variant.id, stock).unwrap();
        (product, variant)
    }
}

/// Notifier that records every delivery.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: Mutex<Vec<(Uuid, NotificationKind)>>,
}

impl NotificationTrigger for RecordingNotifier {
    fn notify(&self, user_id: Uuid, kind: NotificationKind, _payload: &Value) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((user_id, kind));
        Ok(())
    }
}

/// Fulfillment that records invocations and can be switched to fail.
pub(crate) struct ScriptedFulfillment {
    pub calls: Mutex<Vec<Uuid>>,
    pub fail: bool,
}

impl ScriptedFulfillment {
    pub fn succeeding() -> Self {
        Self { calls: Mutex::new(Vec::new()), fail: false }
    }

    pub fn failing() -> Self {
        Self { calls: Mutex::new(Vec::new()), fail: true }
    }
}

impl FulfillmentTrigger for ScriptedFulfillment {
    fn create_fulfillment(&self, gift_id: Uuid, _shipping_address_id: Uuid) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(gift_id);
        if self.fail {
            anyhow::bail!("carrier API unavailable");
        }
        Ok(format!("order-{gift_id}"))
    }
}

//! Line reservations: the atomic quantity merge against the stock ledger.
//!
//! Used by ordinary carts and by gift checkout alike. The correctness
//! property is that concurrent `reserve` calls for the same (container,
//! variant) pair merge by sum; no caller can silently double-reserve past
//! available stock without at least one of them re-validating first.

use uuid::Uuid;

use cadeau_store::{Container, Database, ReservationLine, StoreError};

use crate::error::{EngineError, Result};

/// Reservation service over one database connection.
pub struct LineReservation<'a> {
    db: &'a Database,
}

impl<'a> LineReservation<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Reserve `quantity` units of a variant in a container.
    ///
    /// With `container_id = None` a fresh guest container is created; its
    /// identifier is assigned by the store. A supplied identifier is only
    /// ever resolved, never created, so callers cannot plant a container id.
    ///
    /// An existing line for the pair merges by sum. Stock is checked against
    /// the requested quantity first and re-checked against the merged total
    /// immediately before the write, because a concurrent caller may have
    /// consumed stock between the two reads.
    pub fn reserve(
        &self,
        container_id: Option<Uuid>,
        variant_id: Uuid,
        quantity: i64,
    ) -> Result<ReservationLine> {
        if quantity < 1 {
            return Err(EngineError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let container = self.resolve_container(container_id)?;

        let variant = match self.db.get_variant(variant_id) {
            Ok(v) => v,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !variant.is_active {
            return Err(EngineError::VariantInactive);
        }

        self.check_available(variant_id, quantity)?;

        // Merge target: current line quantity plus the increment.
        let new_total = match self.db.line_for_variant(container.id, variant_id) {
            Ok(line) => line.quantity + quantity,
            Err(StoreError::NotFound) => quantity,
            Err(e) => return Err(e.into()),
        };

        // Re-validate right before the write; stock may have moved since the
        // first read.
        self.check_available(variant_id, new_total)?;

        let line = self.db.upsert_line_add(container.id, variant_id, quantity)?;

        tracing::debug!(
            container_id = %container.id,
            variant_id = %variant_id,
            quantity = line.quantity,
            "reserved line"
        );

        Ok(line)
    }

    /// Set a line's quantity.  Zero deletes the line; a positive quantity is
    /// re-validated against current stock before the write.
    ///
    /// Returns the updated line, or `None` when the line was deleted.
    pub fn update_quantity(
        &self,
        container_id: Uuid,
        line_id: Uuid,
        new_quantity: i64,
    ) -> Result<Option<ReservationLine>> {
        if new_quantity < 0 {
            return Err(EngineError::Validation(
                "quantity must not be negative".to_string(),
            ));
        }

        let line = self.owned_line(container_id, line_id)?;

        if new_quantity == 0 {
            self.db.delete_line(container_id, line.id)?;
            return Ok(None);
        }

        self.check_available(line.variant_id, new_quantity)?;
        self.db.update_line_quantity(line.id, new_quantity)?;

        Ok(Some(self.db.get_line(line.id)?))
    }

    /// Remove a line.  Idempotent: removing an already-removed line succeeds.
    pub fn delete_line(&self, container_id: Uuid, line_id: Uuid) -> Result<()> {
        self.db.delete_line(container_id, line_id)?;
        Ok(())
    }

    /// Bind a guest container to a user.
    pub fn adopt_container(&self, container_id: Uuid, user_id: Uuid) -> Result<bool> {
        match self.db.get_container(container_id) {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        }
        Ok(self.db.adopt_container(container_id, user_id)?)
    }

    /// The sizing check used by gift creation: validates that `quantity`
    /// units are available without reserving anything.
    pub fn check_available(&self, variant_id: Uuid, quantity: i64) -> Result<()> {
        let available = self.db.available_stock(variant_id)?;
        if available < quantity {
            return Err(EngineError::InsufficientStock {
                requested: quantity,
                available,
            });
        }
        Ok(())
    }

    fn resolve_container(&self, container_id: Option<Uuid>) -> Result<Container> {
        match container_id {
            Some(id) => match self.db.get_container(id) {
                Ok(c) => Ok(c),
                Err(StoreError::NotFound) => Err(EngineError::NotFound),
                Err(e) => Err(e.into()),
            },
            None => Ok(self.db.create_container(None)?),
        }
    }

    fn owned_line(&self, container_id: Uuid, line_id: Uuid) -> Result<ReservationLine> {
        let line = match self.db.get_line(line_id) {
            Ok(l) => l,
            Err(StoreError::NotFound) => return Err(EngineError::LineNotFound),
            Err(e) => return Err(e.into()),
        };
        if line.container_id != container_id {
            return Err(EngineError::LineNotFound);
        }
        Ok(line)
    }
}

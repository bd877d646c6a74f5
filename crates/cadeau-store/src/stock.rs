//! The stock ledger: per-warehouse counters and the aggregated read.
//!
//! `available_stock` re-aggregates on every call. Concurrent writers may
//! change warehouse counters at any time, so no caching layer sits in front
//! of the SUM.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::StockRecord;
use crate::util::{ts_col, uuid_col};

impl Database {
    /// Total available stock for a variant across all warehouses.
    ///
    /// A variant with no warehouse records reports 0.
    pub fn available_stock(&self, variant_id: Uuid) -> Result<i64> {
        let total: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(quantity), 0)
             FROM warehouse_stock
             WHERE variant_id = ?1",
            params![variant_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Set a warehouse's counter for a variant (upsert on the unique
    /// (warehouse, variant) pair).
    pub fn set_stock(&self, warehouse: &str, variant_id: Uuid, quantity: i64) -> Result<()> {
        self.conn().execute(
            "INSERT INTO warehouse_stock (id, warehouse, variant_id, quantity, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(warehouse, variant_id)
             DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                warehouse,
                variant_id.to_string(),
                quantity,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List the per-warehouse records for a variant.
    pub fn stock_records(&self, variant_id: Uuid) -> Result<Vec<StockRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, warehouse, variant_id, quantity, updated_at
             FROM warehouse_stock
             WHERE variant_id = ?1
             ORDER BY warehouse ASC",
        )?;

        let rows = stmt.query_map(params![variant_id.to_string()], row_to_stock_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`StockRecord`].
fn row_to_stock_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StockRecord> {
    let id_str: String = row.get(0)?;
    let warehouse: String = row.get(1)?;
    let variant_str: String = row.get(2)?;
    let quantity: i64 = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(StockRecord {
        id: uuid_col(0, &id_str)?,
        warehouse,
        variant_id: uuid_col(2, &variant_str)?,
        quantity,
        updated_at: ts_col(4, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_variant(db: &Database) -> Uuid {
        let product = db.create_product("Enamel pin", true).unwrap();
        db.create_variant(product.id, "gold", 900, None).unwrap().id
    }

    #[test]
    fn no_records_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let variant_id = seed_variant(&db);

        assert_eq!(db.available_stock(variant_id).unwrap(), 0);
    }

    #[test]
    fn aggregates_across_warehouses() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let variant_id = seed_variant(&db);

        db.set_stock("paris", variant_id, 3).unwrap();
        db.set_stock("lille", variant_id, 2).unwrap();
        assert_eq!(db.available_stock(variant_id).unwrap(), 5);

        // Upsert replaces, it does not add.
        db.set_stock("paris", variant_id, 1).unwrap();
        assert_eq!(db.available_stock(variant_id).unwrap(), 3);
        assert_eq!(db.stock_records(variant_id).unwrap().len(), 2);
    }
}

//! CRUD operations for [`Product`] and [`Variant`] records.
//!
//! The catalog is owned elsewhere on the platform; the gift engine only reads
//! it. Write helpers exist for seeding and administration.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Product, Variant};
use crate::util::{ts_col, uuid_col};

impl Database {
    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    /// Insert a new product and return it.
    pub fn create_product(&self, name: &str, is_active: bool) -> Result<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO products (id, name, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                product.id.to_string(),
                product.name,
                product.is_active,
                product.created_at.to_rfc3339(),
            ],
        )?;
        Ok(product)
    }

    /// Fetch a single product by UUID.
    pub fn get_product(&self, id: Uuid) -> Result<Product> {
        self.conn()
            .query_row(
                "SELECT id, name, is_active, created_at
                 FROM products
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_product,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Enable or disable a product.
    pub fn set_product_active(&self, id: Uuid, is_active: bool) -> Result<()> {
        self.conn().execute(
            "UPDATE products SET is_active = ?1 WHERE id = ?2",
            params![is_active, id.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Variants
    // ------------------------------------------------------------------

    /// Insert a new variant and return it.
    pub fn create_variant(
        &self,
        product_id: Uuid,
        label: &str,
        base_price_cents: i64,
        suggested_price_cents: Option<i64>,
    ) -> Result<Variant> {
        let variant = Variant {
            id: Uuid::new_v4(),
            product_id,
            label: label.to_string(),
            is_active: true,
            base_price_cents,
            suggested_price_cents,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO variants (id, product_id, label, is_active, base_price_cents, suggested_price_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                variant.id.to_string(),
                variant.product_id.to_string(),
                variant.label,
                variant.is_active,
                variant.base_price_cents,
                variant.suggested_price_cents,
                variant.created_at.to_rfc3339(),
            ],
        )?;
        Ok(variant)
    }

    /// Fetch a single variant by UUID.
    pub fn get_variant(&self, id: Uuid) -> Result<Variant> {
        self.conn()
            .query_row(
                "SELECT id, product_id, label, is_active, base_price_cents, suggested_price_cents, created_at
                 FROM variants
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_variant,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a product's variants, ordered by label.
    pub fn variants_for_product(&self, product_id: Uuid) -> Result<Vec<Variant>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, product_id, label, is_active, base_price_cents, suggested_price_cents, created_at
             FROM variants
             WHERE product_id = ?1
             ORDER BY label ASC",
        )?;

        let rows = stmt.query_map(params![product_id.to_string()], row_to_variant)?;

        let mut variants = Vec::new();
        for row in rows {
            variants.push(row?);
        }
        Ok(variants)
    }

    /// Enable or disable a variant.
    pub fn set_variant_active(&self, id: Uuid, is_active: bool) -> Result<()> {
        self.conn().execute(
            "UPDATE variants SET is_active = ?1 WHERE id = ?2",
            params![is_active, id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Product`].
fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let is_active: bool = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(Product {
        id: uuid_col(0, &id_str)?,
        name,
        is_active,
        created_at: ts_col(3, &created_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`Variant`].
fn row_to_variant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Variant> {
    let id_str: String = row.get(0)?;
    let product_str: String = row.get(1)?;
    let label: String = row.get(2)?;
    let is_active: bool = row.get(3)?;
    let base_price_cents: i64 = row.get(4)?;
    let suggested_price_cents: Option<i64> = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Variant {
        id: uuid_col(0, &id_str)?,
        product_id: uuid_col(1, &product_str)?,
        label,
        is_active,
        base_price_cents,
        suggested_price_cents,
        created_at: ts_col(6, &created_str)?,
    })
}

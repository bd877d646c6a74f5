//! CRUD operations for [`Container`] and [`ReservationLine`] records.
//!
//! The unique index on (container_id, variant_id) plus the summing upsert in
//! [`Database::upsert_line_add`] is what makes concurrent `reserve` calls for
//! the same pair safe: two first-adds cannot both insert, and two merges
//! cannot lose an increment.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Container, ReservationLine};
use crate::util::{opt_uuid_col, ts_col, uuid_col};

impl Database {
    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Insert a new container and return it.
    ///
    /// The identifier is always assigned here; callers never supply one, so
    /// identifier-collision attacks against foreign containers are not
    /// possible.
    pub fn create_container(&self, owner_id: Option<Uuid>) -> Result<Container> {
        let container = Container {
            id: Uuid::new_v4(),
            owner_id,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO containers (id, owner_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                container.id.to_string(),
                container.owner_id.map(|o| o.to_string()),
                container.created_at.to_rfc3339(),
            ],
        )?;
        Ok(container)
    }

    /// Fetch a single container by UUID.
    pub fn get_container(&self, id: Uuid) -> Result<Container> {
        self.conn()
            .query_row(
                "SELECT id, owner_id, created_at
                 FROM containers
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_container,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Bind a guest container to a user.  Returns `false` when the container
    /// already has an owner (the bind is first-writer-wins).
    pub fn adopt_container(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE containers SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
            params![user_id.to_string(), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Reservation lines
    // ------------------------------------------------------------------

    /// Add `quantity` to the line for (container, variant), creating the line
    /// if absent.
    ///
    /// The write is a single atomic upsert against the unique
    /// (container_id, variant_id) index, so concurrent callers merge by sum
    /// instead of racing inserts. Returns the line as it stands after this
    /// write.
    pub fn upsert_line_add(
        &self,
        container_id: Uuid,
        variant_id: Uuid,
        quantity: i64,
    ) -> Result<ReservationLine> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO reservation_lines (id, container_id, variant_id, quantity, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(container_id, variant_id)
             DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                container_id.to_string(),
                variant_id.to_string(),
                quantity,
                now,
            ],
        )?;

        self.line_for_variant(container_id, variant_id)
    }

    /// Fetch the line for (container, variant), if any.
    pub fn line_for_variant(
        &self,
        container_id: Uuid,
        variant_id: Uuid,
    ) -> Result<ReservationLine> {
        self.conn()
            .query_row(
                "SELECT id, container_id, variant_id, quantity, created_at, updated_at
                 FROM reservation_lines
                 WHERE container_id = ?1 AND variant_id = ?2",
                params![container_id.to_string(), variant_id.to_string()],
                row_to_line,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a single line by UUID.
    pub fn get_line(&self, id: Uuid) -> Result<ReservationLine> {
        self.conn()
            .query_row(
                "SELECT id, container_id, variant_id, quantity, created_at, updated_at
                 FROM reservation_lines
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_line,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a container's lines in insertion order.
    pub fn lines_for_container(&self, container_id: Uuid) -> Result<Vec<ReservationLine>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, container_id, variant_id, quantity, created_at, updated_at
             FROM reservation_lines
             WHERE container_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![container_id.to_string()], row_to_line)?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    /// Set a line's quantity to an absolute value.
    pub fn update_line_quantity(&self, id: Uuid, quantity: i64) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE reservation_lines SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
            params![quantity, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a line, scoped to its container.  Returns `true` if a row was
    /// deleted; a missing line is not an error.
    pub fn delete_line(&self, container_id: Uuid, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM reservation_lines WHERE id = ?1 AND container_id = ?2",
            params![id.to_string(), container_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Container`].
fn row_to_container(row: &rusqlite::Row<'_>) -> rusqlite::Result<Container> {
    let id_str: String = row.get(0)?;
    let owner_str: Option<String> = row.get(1)?;
    let created_str: String = row.get(2)?;

    Ok(Container {
        id: uuid_col(0, &id_str)?,
        owner_id: opt_uuid_col(1, owner_str.as_deref())?,
        created_at: ts_col(2, &created_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`ReservationLine`].
fn row_to_line(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReservationLine> {
    let id_str: String = row.get(0)?;
    let container_str: String = row.get(1)?;
    let variant_str: String = row.get(2)?;
    let quantity: i64 = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    Ok(ReservationLine {
        id: uuid_col(0, &id_str)?,
        container_id: uuid_col(1, &container_str)?,
        variant_id: uuid_col(2, &variant_str)?,
        quantity,
        created_at: ts_col(4, &created_str)?,
        updated_at: ts_col(5, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn seed_variant(db: &Database) -> Uuid {
        let product = db.create_product("Tea sampler", true).unwrap();
        db.create_variant(product.id, "12 bags", 1_500, None)
            .unwrap()
            .id
    }

    #[test]
    fn guest_container_then_adoption() {
        let (_dir, db) = open_db();
        let container = db.create_container(None).unwrap();
        assert!(container.owner_id.is_none());

        let user = db.create_user("Jo").unwrap();
        assert!(db.adopt_container(container.id, user.id).unwrap());
        assert_eq!(
            db.get_container(container.id).unwrap().owner_id,
            Some(user.id)
        );

        // Second adoption loses.
        let other = db.create_user("Kim").unwrap();
        assert!(!db.adopt_container(container.id, other.id).unwrap());
    }

    #[test]
    fn upsert_merges_instead_of_duplicating() {
        let (_dir, db) = open_db();
        let variant_id = seed_variant(&db);
        let container = db.create_container(None).unwrap();

        let first = db.upsert_line_add(container.id, variant_id, 2).unwrap();
        let second = db.upsert_line_add(container.id, variant_id, 3).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(db.lines_for_container(container.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_line_is_idempotent() {
        let (_dir, db) = open_db();
        let variant_id = seed_variant(&db);
        let container = db.create_container(None).unwrap();
        let line = db.upsert_line_add(container.id, variant_id, 1).unwrap();

        assert!(db.delete_line(container.id, line.id).unwrap());
        assert!(!db.delete_line(container.id, line.id).unwrap());
    }
}

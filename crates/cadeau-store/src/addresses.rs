//! CRUD operations for [`Address`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Address;
use crate::util::{ts_col, uuid_col};

/// Fields needed to create a new address.
#[derive(Debug, Clone)]
pub struct NewAddress<'a> {
    pub user_id: Uuid,
    pub recipient: &'a str,
    pub line1: &'a str,
    pub city: &'a str,
    pub postal_code: &'a str,
    pub country: &'a str,
}

impl Database {
    /// Insert a new shipping address and return it.
    pub fn create_address(&self, new: NewAddress<'_>) -> Result<Address> {
        let address = Address {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            recipient: new.recipient.to_string(),
            line1: new.line1.to_string(),
            city: new.city.to_string(),
            postal_code: new.postal_code.to_string(),
            country: new.country.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO addresses (id, user_id, recipient, line1, city, postal_code, country, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                address.id.to_string(),
                address.user_id.to_string(),
                address.recipient,
                address.line1,
                address.city,
                address.postal_code,
                address.country,
                address.created_at.to_rfc3339(),
            ],
        )?;
        Ok(address)
    }

    /// Fetch a single address by UUID.
    pub fn get_address(&self, id: Uuid) -> Result<Address> {
        self.conn()
            .query_row(
                "SELECT id, user_id, recipient, line1, city, postal_code, country, created_at
                 FROM addresses
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_address,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a user's addresses, newest first.
    pub fn addresses_for_user(&self, user_id: Uuid) -> Result<Vec<Address>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, recipient, line1, city, postal_code, country, created_at
             FROM addresses
             WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_address)?;

        let mut addresses = Vec::new();
        for row in rows {
            addresses.push(row?);
        }
        Ok(addresses)
    }

    /// Delete an address by UUID.  Returns `true` if a row was deleted.
    pub fn delete_address(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM addresses WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Address`].
fn row_to_address(row: &rusqlite::Row<'_>) -> rusqlite::Result<Address> {
    let id_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let recipient: String = row.get(2)?;
    let line1: String = row.get(3)?;
    let city: String = row.get(4)?;
    let postal_code: String = row.get(5)?;
    let country: String = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(Address {
        id: uuid_col(0, &id_str)?,
        user_id: uuid_col(1, &user_str)?,
        recipient,
        line1,
        city,
        postal_code,
        country,
        created_at: ts_col(7, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let user = db.create_user("Sasha").unwrap();

        let address = db
            .create_address(NewAddress {
                user_id: user.id,
                recipient: "Sasha V.",
                line1: "12 rue des Lilas",
                city: "Lyon",
                postal_code: "69003",
                country: "FR",
            })
            .unwrap();

        assert_eq!(db.get_address(address.id).unwrap(), address);
        assert_eq!(db.addresses_for_user(user.id).unwrap().len(), 1);

        assert!(db.delete_address(address.id).unwrap());
        assert!(db.addresses_for_user(user.id).unwrap().is_empty());
    }
}

//! CRUD operations for [`User`] records and the friendship relation.
//!
//! Friendships feed the visibility policy's diagnostics only; the policy's
//! boolean never depends on them.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::util::{ts_col, uuid_col};

impl Database {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a new user and return it.
    pub fn create_user(&self, display_name: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO users (id, display_name, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                user.id.to_string(),
                user.display_name,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(user)
    }

    /// Fetch a single user by UUID.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, display_name, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    // ------------------------------------------------------------------
    // Friendships
    // ------------------------------------------------------------------

    /// Record a friendship between two users.  Idempotent; the pair is
    /// normalized so that (a, b) and (b, a) are the same row.
    pub fn add_friendship(&self, a: Uuid, b: Uuid) -> Result<()> {
        let (lo, hi) = normalize_pair(a, b);
        self.conn().execute(
            "INSERT OR IGNORE INTO friendships (user_a, user_b, created_at)
             VALUES (?1, ?2, ?3)",
            params![lo.to_string(), hi.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove a friendship.  Returns `true` if a row was deleted.
    pub fn remove_friendship(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let (lo, hi) = normalize_pair(a, b);
        let affected = self.conn().execute(
            "DELETE FROM friendships WHERE user_a = ?1 AND user_b = ?2",
            params![lo.to_string(), hi.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Whether the two users are friends.
    pub fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let (lo, hi) = normalize_pair(a, b);
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM friendships WHERE user_a = ?1 AND user_b = ?2",
            params![lo.to_string(), hi.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Order a user pair so the lexicographically smaller id is stored first.
fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a.to_string() <= b.to_string() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    Ok(User {
        id: uuid_col(0, &id_str)?,
        display_name,
        created_at: ts_col(2, &created_str)?,
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

    #[test]
    fn user_round_trip() {
        let (_dir, db) = open_db();
        let user = db.create_user("Margot").unwrap();
        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched, user);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (_dir, db) = open_db();
        assert!(matches!(
            db.get_user(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn friendship_is_symmetric_and_idempotent() {
        let (_dir, db) = open_db();
        let a = db.create_user("a").unwrap();
        let b = db.create_user("b").unwrap();

        assert!(!db.are_friends(a.id, b.id).unwrap());

        db.add_friendship(a.id, b.id).unwrap();
        db.add_friendship(b.id, a.id).unwrap();

        assert!(db.are_friends(a.id, b.id).unwrap());
        assert!(db.are_friends(b.id, a.id).unwrap());

        assert!(db.remove_friendship(b.id, a.id).unwrap());
        assert!(!db.are_friends(a.id, b.id).unwrap());
    }
}

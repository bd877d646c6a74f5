//! CRUD operations for [`Conversation`] and [`Participant`] records.
//!
//! An anonymous-gift conversation is created exactly once per gift. The
//! create-and-link write runs in one transaction that re-reads the gift's
//! `conversation_id` first, so retried acceptances converge on a single
//! conversation instead of leaking duplicates.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Conversation, ConversationKind, Participant};
use crate::util::{ts_col, uuid_col};

impl Database {
    /// Open the anonymous-gift conversation for a gift, creating it if the
    /// gift has none yet.  Idempotent: the existing conversation is returned
    /// as-is on every later call.
    ///
    /// Runs as a single transaction on this connection; the engine guarantees
    /// one connection per unit of work, which is what `unchecked_transaction`
    /// requires.
    pub fn open_gift_conversation(
        &self,
        gift_id: Uuid,
        sender_id: Uuid,
        sender_alias: &str,
        receiver_id: Uuid,
        receiver_alias: &str,
    ) -> Result<Conversation> {
        let tx = self.conn().unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT conversation_id FROM gifts WHERE id = ?1",
                params![gift_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if let Some(id_str) = existing {
            let conversation_id = Uuid::parse_str(&id_str)?;
            let conversation = tx
                .query_row(
                    "SELECT id, kind, created_at FROM conversations WHERE id = ?1",
                    params![id_str],
                    row_to_conversation,
                )
                .map_err(StoreError::Sqlite)?;
            tx.commit()?;
            tracing::debug!(
                gift_id = %gift_id,
                conversation_id = %conversation_id,
                "gift conversation already open"
            );
            return Ok(conversation);
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::AnonymousGift,
            created_at: Utc::now(),
        };
        let joined_at = conversation.created_at.to_rfc3339();

        tx.execute(
            "INSERT INTO conversations (id, kind, created_at) VALUES (?1, ?2, ?3)",
            params![
                conversation.id.to_string(),
                conversation.kind.as_str(),
                joined_at,
            ],
        )?;

        tx.execute(
            "INSERT INTO conversation_participants (conversation_id, user_id, display_alias, is_revealed, joined_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                conversation.id.to_string(),
                sender_id.to_string(),
                sender_alias,
                joined_at,
            ],
        )?;

        tx.execute(
            "INSERT INTO conversation_participants (conversation_id, user_id, display_alias, is_revealed, joined_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                conversation.id.to_string(),
                receiver_id.to_string(),
                receiver_alias,
                joined_at,
            ],
        )?;

        tx.execute(
            "UPDATE gifts SET conversation_id = ?1 WHERE id = ?2",
            params![conversation.id.to_string(), gift_id.to_string()],
        )?;

        tx.commit()?;

        tracing::info!(
            gift_id = %gift_id,
            conversation_id = %conversation.id,
            "opened anonymous gift conversation"
        );

        Ok(conversation)
    }

    /// Fetch a single conversation by UUID.
    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.conn()
            .query_row(
                "SELECT id, kind, created_at FROM conversations WHERE id = ?1",
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a conversation's participants in join order.
    pub fn participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>> {
        let mut stmt = self.conn().prepare(
            "SELECT conversation_id, user_id, display_alias, is_revealed, joined_at
             FROM conversation_participants
             WHERE conversation_id = ?1
             ORDER BY joined_at ASC, user_id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_participant)?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    /// Fetch one participant row.
    pub fn get_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<Participant> {
        self.conn()
            .query_row(
                "SELECT conversation_id, user_id, display_alias, is_revealed, joined_at
                 FROM conversation_participants
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user_id.to_string()],
                row_to_participant,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Set a participant's reveal flag.  One-way: there is no write path back
    /// to unrevealed.  Returns `true` if the row existed.
    pub fn set_participant_revealed(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE conversation_participants SET is_revealed = 1
             WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    let kind = ConversationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown conversation kind: {kind_str}").into(),
        )
    })?;

    Ok(Conversation {
        id: uuid_col(0, &id_str)?,
        kind,
        created_at: ts_col(2, &created_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`Participant`].
fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    let conversation_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let display_alias: String = row.get(2)?;
    let is_revealed: bool = row.get(3)?;
    let joined_str: String = row.get(4)?;

    Ok(Participant {
        conversation_id: uuid_col(0, &conversation_str)?,
        user_id: uuid_col(1, &user_str)?,
        display_alias,
        is_revealed,
        joined_at: ts_col(4, &joined_str)?,
    })
}

//! CRUD operations for [`Gift`] records.
//!
//! Every state advance goes through [`Database::advance_state`] or
//! [`Database::accept_gift`]: a conditional UPDATE guarded by the set of
//! states the caller observed. The affected-row count tells the caller
//! whether it won the transition; a miss means the record moved underneath
//! it. This is the optimistic concurrency contract the engine builds on.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use cadeau_shared::{ExternalReceiver, GiftState};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Gift;
use crate::util::{opt_ts_col, opt_uuid_col, ts_col, uuid_col};

const GIFT_COLUMNS: &str = "id, sender_id, receiver_id, ext_handle, ext_email, ext_phone, \
     ext_display_name, product_id, variant_id, quantity, sender_alias, sender_message, state, \
     payment_status, link_token, conversation_id, order_id, shipping_address_id, created_at, \
     accepted_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a fully validated gift record.
    pub fn insert_gift(&self, gift: &Gift) -> Result<()> {
        let ext = gift.external_receiver.clone().unwrap_or_default();
        self.conn().execute(
            "INSERT INTO gifts (id, sender_id, receiver_id, ext_handle, ext_email, ext_phone,
                                ext_display_name, product_id, variant_id, quantity, sender_alias,
                                sender_message, state, payment_status, link_token, conversation_id,
                                order_id, shipping_address_id, created_at, accepted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                gift.id.to_string(),
                gift.sender_id.to_string(),
                gift.receiver_id.map(|r| r.to_string()),
                ext.handle,
                ext.email,
                ext.phone,
                ext.display_name,
                gift.product_id.to_string(),
                gift.variant_id.map(|v| v.to_string()),
                gift.quantity,
                gift.sender_alias,
                gift.sender_message,
                gift.state.as_str(),
                gift.payment_status,
                gift.link_token,
                gift.conversation_id.map(|c| c.to_string()),
                gift.order_id,
                gift.shipping_address_id.map(|a| a.to_string()),
                gift.created_at.to_rfc3339(),
                gift.accepted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single gift by UUID.
    pub fn get_gift(&self, id: Uuid) -> Result<Gift> {
        self.conn()
            .query_row(
                &format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE id = ?1"),
                params![id.to_string()],
                row_to_gift,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Resolve an acceptance link token to its gift.
    pub fn get_gift_by_token(&self, token: &str) -> Result<Gift> {
        self.conn()
            .query_row(
                &format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE link_token = ?1"),
                params![token],
                row_to_gift,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List gifts sent by a user, newest first.
    pub fn gifts_for_sender(&self, sender_id: Uuid) -> Result<Vec<Gift>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GIFT_COLUMNS} FROM gifts WHERE sender_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![sender_id.to_string()], row_to_gift)?;

        let mut gifts = Vec::new();
        for row in rows {
            gifts.push(row?);
        }
        Ok(gifts)
    }

    /// Accepted gifts whose fulfillment has not been recorded yet.
    ///
    /// This is the work list for the out-of-band fulfillment retry job.
    pub fn gifts_awaiting_fulfillment(&self) -> Result<Vec<Gift>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GIFT_COLUMNS} FROM gifts
             WHERE state = 'accepted' AND order_id IS NULL
             ORDER BY accepted_at ASC"
        ))?;

        let rows = stmt.query_map([], row_to_gift)?;

        let mut gifts = Vec::new();
        for row in rows {
            gifts.push(row?);
        }
        Ok(gifts)
    }

    // ------------------------------------------------------------------
    // Guarded writes
    // ------------------------------------------------------------------

    /// Advance a gift's state, conditional on its current state being one of
    /// `from`.  Returns `true` when the transition was applied; `false` means
    /// the record was not in any of the expected states at write time.
    pub fn advance_state(&self, id: Uuid, from: &[GiftState], to: GiftState) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }
        let placeholders = from.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE gifts SET state = ?1 WHERE id = ?2 AND state IN ({placeholders})"
        );

        let mut args: Vec<String> = vec![to.as_str().to_string(), id.to_string()];
        args.extend(from.iter().map(|s| s.as_str().to_string()));

        let affected = self.conn().execute(&sql, params_from_iter(args))?;
        Ok(affected > 0)
    }

    /// Accept a gift: one conditional write that moves it to `accepted`,
    /// binds the receiver, captures the shipping address and stamps the
    /// acceptance time.  Returns `false` when the gift was not acceptable at
    /// write time (already moved).
    pub fn accept_gift(
        &self,
        id: Uuid,
        receiver_id: Uuid,
        shipping_address_id: Uuid,
        accepted_at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE gifts
             SET state = 'accepted', receiver_id = ?1, shipping_address_id = ?2, accepted_at = ?3
             WHERE id = ?4 AND state IN ('paid', 'waiting_acceptance')",
            params![
                receiver_id.to_string(),
                shipping_address_id.to_string(),
                accepted_at.to_rfc3339(),
                id.to_string(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Mint the acceptance link token, only if none exists yet.  Redelivered
    /// payment events call this repeatedly; only the first write sticks.
    pub fn set_link_token_if_absent(&self, id: Uuid, token: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE gifts SET link_token = ?1 WHERE id = ?2 AND link_token IS NULL",
            params![token, id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Mirror the raw upstream payment status onto the gift.
    pub fn set_payment_status(&self, id: Uuid, status: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE gifts SET payment_status = ?1 WHERE id = ?2",
            params![status, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record the downstream fulfillment reference.
    pub fn set_order_id(&self, id: Uuid, order_id: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE gifts SET order_id = ?1 WHERE id = ?2",
            params![order_id, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Gift`].
fn row_to_gift(row: &rusqlite::Row<'_>) -> rusqlite::Result<Gift> {
    let id_str: String = row.get(0)?;
    let sender_str: String = row.get(1)?;
    let receiver_str: Option<String> = row.get(2)?;
    let ext_handle: Option<String> = row.get(3)?;
    let ext_email: Option<String> = row.get(4)?;
    let ext_phone: Option<String> = row.get(5)?;
    let ext_display_name: Option<String> = row.get(6)?;
    let product_str: String = row.get(7)?;
    let variant_str: Option<String> = row.get(8)?;
    let quantity: i64 = row.get(9)?;
    let sender_alias: String = row.get(10)?;
    let sender_message: Option<String> = row.get(11)?;
    let state_str: String = row.get(12)?;
    let payment_status: Option<String> = row.get(13)?;
    let link_token: Option<String> = row.get(14)?;
    let conversation_str: Option<String> = row.get(15)?;
    let order_id: Option<String> = row.get(16)?;
    let address_str: Option<String> = row.get(17)?;
    let created_str: String = row.get(18)?;
    let accepted_str: Option<String> = row.get(19)?;

    let state = GiftState::parse(&state_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("unknown gift state: {state_str}").into(),
        )
    })?;

    let external_receiver = if ext_handle.is_some()
        || ext_email.is_some()
        || ext_phone.is_some()
        || ext_display_name.is_some()
    {
        Some(ExternalReceiver {
            handle: ext_handle,
            email: ext_email,
            phone: ext_phone,
            display_name: ext_display_name,
        })
    } else {
        None
    };

    Ok(Gift {
        id: uuid_col(0, &id_str)?,
        sender_id: uuid_col(1, &sender_str)?,
        receiver_id: opt_uuid_col(2, receiver_str.as_deref())?,
        external_receiver,
        product_id: uuid_col(7, &product_str)?,
        variant_id: opt_uuid_col(8, variant_str.as_deref())?,
        quantity,
        sender_alias,
        sender_message,
        state,
        payment_status,
        link_token,
        conversation_id: opt_uuid_col(15, conversation_str.as_deref())?,
        order_id,
        shipping_address_id: opt_uuid_col(17, address_str.as_deref())?,
        created_at: ts_col(18, &created_str)?,
        accepted_at: opt_ts_col(19, accepted_str.as_deref())?,
    })
}

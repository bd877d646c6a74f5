//! v001 -- Initial schema creation.
//!
//! Creates the catalog, stock, reservation, gift and conversation tables.
//! The three unique indexes here are load-bearing for the engine:
//! `reservation_lines(container_id, variant_id)` makes concurrent first-adds
//! collapse into one row, `gifts(link_token)` makes token lookup exact, and
//! `conversation_participants(conversation_id, user_id)` caps an
//! anonymous-gift conversation at one row per side.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Friendships (diagnostics only; never load-bearing for visibility)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_a     TEXT NOT NULL,                 -- lexicographically smaller id
    user_b     TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_a, user_b),
    FOREIGN KEY (user_a) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (user_b) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Shipping addresses
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS addresses (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    user_id     TEXT NOT NULL,                -- FK -> users(id)
    recipient   TEXT NOT NULL,
    line1       TEXT NOT NULL,
    city        TEXT NOT NULL,
    postal_code TEXT NOT NULL,
    country     TEXT NOT NULL,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_addresses_user_id ON addresses(user_id);

-- ----------------------------------------------------------------
-- Catalog
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS products (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name       TEXT NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS variants (
    id                    TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    product_id            TEXT NOT NULL,              -- FK -> products(id)
    label                 TEXT NOT NULL,
    is_active             INTEGER NOT NULL DEFAULT 1,
    base_price_cents      INTEGER NOT NULL,
    suggested_price_cents INTEGER,
    created_at            TEXT NOT NULL,

    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_variants_product_id ON variants(product_id);

-- ----------------------------------------------------------------
-- Warehouse stock (available stock is always SUMmed, never denormalized)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS warehouse_stock (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    warehouse  TEXT NOT NULL,
    variant_id TEXT NOT NULL,                 -- FK -> variants(id)
    quantity   INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    updated_at TEXT NOT NULL,

    FOREIGN KEY (variant_id) REFERENCES variants(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_stock_warehouse_variant
    ON warehouse_stock(warehouse, variant_id);

-- ----------------------------------------------------------------
-- Reservation containers (carts and gift-checkout holders)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS containers (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4, always store-assigned
    owner_id   TEXT,                          -- nullable FK -> users(id); guest containers are valid
    created_at TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS reservation_lines (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    container_id TEXT NOT NULL,               -- FK -> containers(id)
    variant_id   TEXT NOT NULL,               -- FK -> variants(id)
    quantity     INTEGER NOT NULL CHECK (quantity >= 1),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,

    FOREIGN KEY (container_id) REFERENCES containers(id) ON DELETE CASCADE,
    FOREIGN KEY (variant_id)   REFERENCES variants(id)   ON DELETE CASCADE
);

-- At most one line per (container, variant); concurrent adds merge by sum.
CREATE UNIQUE INDEX IF NOT EXISTS idx_lines_container_variant
    ON reservation_lines(container_id, variant_id);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    kind       TEXT NOT NULL,                 -- 'direct' | 'anonymous_gift'
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_participants (
    conversation_id TEXT NOT NULL,            -- FK -> conversations(id)
    user_id         TEXT NOT NULL,            -- FK -> users(id)
    display_alias   TEXT NOT NULL,
    is_revealed     INTEGER NOT NULL DEFAULT 0,  -- monotonic once set
    joined_at       TEXT NOT NULL,

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)         REFERENCES users(id)         ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Gifts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS gifts (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    sender_id           TEXT NOT NULL,              -- FK -> users(id)
    receiver_id         TEXT,                       -- nullable until an external gift is accepted
    ext_handle          TEXT,
    ext_email           TEXT,
    ext_phone           TEXT,
    ext_display_name    TEXT,
    product_id          TEXT NOT NULL,              -- FK -> products(id)
    variant_id          TEXT,                       -- nullable FK -> variants(id)
    quantity            INTEGER NOT NULL CHECK (quantity >= 1),
    sender_alias        TEXT NOT NULL,
    sender_message      TEXT,
    state               TEXT NOT NULL,              -- see cadeau_shared::GiftState
    payment_status      TEXT,                       -- raw upstream status mirror
    link_token          TEXT,                       -- minted once, external receivers only
    conversation_id     TEXT,                       -- set only after acceptance
    order_id            TEXT,                       -- set only after fulfillment succeeds
    shipping_address_id TEXT,                       -- captured at acceptance, drives fulfillment retries
    created_at          TEXT NOT NULL,
    accepted_at         TEXT,

    FOREIGN KEY (sender_id)       REFERENCES users(id),
    FOREIGN KEY (receiver_id)     REFERENCES users(id),
    FOREIGN KEY (product_id)      REFERENCES products(id),
    FOREIGN KEY (variant_id)      REFERENCES variants(id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_gifts_link_token ON gifts(link_token);
CREATE INDEX IF NOT EXISTS idx_gifts_sender_id ON gifts(sender_id);
CREATE INDEX IF NOT EXISTS idx_gifts_receiver_id ON gifts(receiver_id);
CREATE INDEX IF NOT EXISTS idx_gifts_state ON gifts(state);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

//! v001 -- Initial schema creation.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- assigned by the identity provider
    username     TEXT NOT NULL,
    email        TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    avatar_url   TEXT,
    status       TEXT NOT NULL DEFAULT 'offline',
    last_seen    INTEGER NOT NULL DEFAULT 0   -- epoch millis
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
CREATE INDEX IF NOT EXISTS idx_users_phone ON users(phone_number);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id           TEXT PRIMARY KEY NOT NULL,   -- derived (direct) or random (group)
    kind         TEXT NOT NULL DEFAULT 'direct',
    group_name   TEXT NOT NULL DEFAULT '',
    last_message TEXT NOT NULL DEFAULT '',
    timestamp    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_conversations_ts ON conversations(timestamp DESC);

CREATE TABLE IF NOT EXISTS conversation_participants (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    position        INTEGER NOT NULL,

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_user ON conversation_participants(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order, breaks timestamp ties
    id              TEXT NOT NULL UNIQUE,               -- UUID v4
    conversation_id TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    content         TEXT NOT NULL,
    timestamp       INTEGER NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, timestamp ASC, seq ASC);

-- ----------------------------------------------------------------
-- Friend requests and friend edges
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending',
    timestamp   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_receiver ON friend_requests(receiver_id, status);

CREATE TABLE IF NOT EXISTS friends (
    owner_id   TEXT NOT NULL,
    friend_id  TEXT NOT NULL,
    username   TEXT NOT NULL,                 -- snapshot at acceptance time
    avatar_url TEXT,

    PRIMARY KEY (owner_id, friend_id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

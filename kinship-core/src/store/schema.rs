//! Table layout. Applied on every open; all statements are idempotent.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS marriages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user1_id      INTEGER NOT NULL,
    user1_name    TEXT    NOT NULL,
    user2_id      INTEGER NOT NULL,
    user2_name    TEXT    NOT NULL,
    marriage_date TEXT    NOT NULL,
    divorce_date  TEXT,
    active        INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_marriages_user1 ON marriages(user1_id) WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_marriages_user2 ON marriages(user2_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS proposals (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id    INTEGER NOT NULL,
    from_name  TEXT    NOT NULL,
    to_id      INTEGER NOT NULL,
    to_name    TEXT    NOT NULL,
    message_id INTEGER UNIQUE,
    created_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS arguments (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user1_id       INTEGER NOT NULL,
    user2_id       INTEGER NOT NULL,
    start_time     TEXT    NOT NULL,
    duration_hours INTEGER NOT NULL DEFAULT 24
);

CREATE INDEX IF NOT EXISTS idx_arguments_user1 ON arguments(user1_id);
CREATE INDEX IF NOT EXISTS idx_arguments_user2 ON arguments(user2_id);

CREATE TABLE IF NOT EXISTS kidnappings (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    kidnapper_id   INTEGER NOT NULL,
    kidnapper_name TEXT    NOT NULL,
    victim_id      INTEGER NOT NULL,
    victim_name    TEXT    NOT NULL,
    kidnap_time    TEXT    NOT NULL,
    duration_hours INTEGER NOT NULL DEFAULT 6
);

CREATE INDEX IF NOT EXISTS idx_kidnappings_kidnapper ON kidnappings(kidnapper_id);
CREATE INDEX IF NOT EXISTS idx_kidnappings_victim ON kidnappings(victim_id);

CREATE TABLE IF NOT EXISTS kidnap_stats (
    user_id      INTEGER PRIMARY KEY,
    user_name    TEXT    NOT NULL,
    kidnap_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS children (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    marriage_id  INTEGER NOT NULL REFERENCES marriages(id),
    parent1_id   INTEGER NOT NULL,
    parent2_id   INTEGER NOT NULL,
    name         TEXT,
    age          INTEGER NOT NULL DEFAULT 0,
    created_date TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_children_parent1 ON children(parent1_id);
CREATE INDEX IF NOT EXISTS idx_children_parent2 ON children(parent2_id);

CREATE TABLE IF NOT EXISTS child_naming (
    user_id   INTEGER PRIMARY KEY,
    child_id  INTEGER NOT NULL REFERENCES children(id) ON DELETE CASCADE,
    temp_name TEXT    NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS cooldowns (
    user_id   INTEGER NOT NULL,
    scope     TEXT    NOT NULL,
    command   TEXT    NOT NULL,
    last_used TEXT    NOT NULL,
    PRIMARY KEY (user_id, scope)
);
";

/// Create every table and index that does not exist yet.
pub(crate) fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    debug!("Kinship schema applied");
    Ok(())
}

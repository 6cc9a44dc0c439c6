//! SQLite-backed stores for conversation history and per-channel mutes.
//!
//! History is kept per channel and user as a bounded log of individual
//! messages (a turn is one user message plus one reply). Mute state is a flag
//! per channel; a failed lookup reads as "not muted" so a database problem never
//! silences the bot.

use poise::serenity_prelude::{ChannelId, UserId};
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Who wrote a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn parse(raw: &str) -> Self {
        if raw == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

/// One message of a stored conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

pub struct Store {
    conn: Mutex<Connection>,
    /// Individual messages kept per channel and user
    max_messages: usize,
}

impl Store {
    /// Open (or create) the database file and its tables.
    pub fn open(path: impl AsRef<Path>, history_turns: usize) -> SqlResult<Self> {
        let store = Self::with_connection(Connection::open(path.as_ref())?, history_turns)?;
        info!(
            "Opened database at {} (keeping {} history messages)",
            path.as_ref().display(),
            store.max_messages
        );
        Ok(store)
    }

    pub fn in_memory(history_turns: usize) -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, history_turns)
    }

    fn with_connection(conn: Connection, history_turns: usize) -> SqlResult<Self> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_messages: (history_turns * 2).max(2),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The stored conversation, oldest first.
    pub fn get_history(&self, channel_id: ChannelId, user_id: UserId) -> SqlResult<Vec<HistoryMessage>> {
        let conn = self.conn();
        let mut statement = conn.prepare(
            "SELECT role, content FROM history
             WHERE channel_id = ?1 AND user_id = ?2
             ORDER BY id ASC",
        )?;
        let rows = statement.query_map(params![channel_id.get(), user_id.get()], |row| {
            let role: String = row.get(0)?;
            Ok(HistoryMessage {
                role: Role::parse(&role),
                content: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    /// Record one exchange and drop the oldest messages beyond the limit.
    pub fn append_turn(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        user_text: &str,
        reply_text: &str,
    ) -> SqlResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (role, content) in [(Role::User, user_text), (Role::Assistant, reply_text)] {
            if content.trim().is_empty() {
                continue;
            }
            tx.execute(
                "INSERT INTO history (channel_id, user_id, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![channel_id.get(), user_id.get(), role.as_str(), content],
            )?;
        }
        let trimmed = tx.execute(
            "DELETE FROM history
             WHERE channel_id = ?1 AND user_id = ?2 AND id NOT IN (
                 SELECT id FROM history
                 WHERE channel_id = ?1 AND user_id = ?2
                 ORDER BY id DESC
                 LIMIT ?3
             )",
            params![channel_id.get(), user_id.get(), self.max_messages as i64],
        )?;
        tx.commit()?;

        if trimmed > 0 {
            debug!(
                "Trimmed {} old history message(s) for user {} in channel {}",
                trimmed, user_id, channel_id
            );
        }
        Ok(())
    }

    /// Returns `true` when there was history to remove.
    pub fn clear_history(&self, channel_id: ChannelId, user_id: UserId) -> SqlResult<bool> {
        let removed = self.conn().execute(
            "DELETE FROM history WHERE channel_id = ?1 AND user_id = ?2",
            params![channel_id.get(), user_id.get()],
        )?;
        Ok(removed > 0)
    }

    /// Lookup errors are logged and read as not muted.
    pub fn is_muted(&self, channel_id: ChannelId) -> bool {
        let result = self
            .conn()
            .query_row(
                "SELECT muted FROM channel_mutes WHERE channel_id = ?1",
                params![channel_id.get()],
                |row| row.get::<_, bool>(0),
            )
            .optional();

        match result {
            Ok(muted) => muted.unwrap_or(false),
            Err(e) => {
                error!("Failed to read mute state for channel {}: {}", channel_id, e);
                false
            }
        }
    }

    /// Returns `true` when the new state was stored.
    pub fn set_muted(&self, channel_id: ChannelId, muted: bool) -> bool {
        let result = self.conn().execute(
            "INSERT OR REPLACE INTO channel_mutes (channel_id, muted) VALUES (?1, ?2)",
            params![channel_id.get(), muted],
        );

        match result {
            Ok(_) => {
                info!("Channel {} muted: {}", channel_id, muted);
                true
            }
            Err(e) => {
                error!("Failed to store mute state for channel {}: {}", channel_id, e);
                false
            }
        }
    }
}

/// Creates the `history` and `channel_mutes` tables if they don't exist.
fn create_tables(conn: &Connection) -> SqlResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS history_owner ON history (channel_id, user_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS channel_mutes (
            channel_id INTEGER PRIMARY KEY,
            muted BOOLEAN NOT NULL
        )",
        [],
    )?;
    Ok(())
}

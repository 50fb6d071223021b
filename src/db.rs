//! Database module
//!
//! Persists per-conversation turn state, pending sign-in prompts and user
//! tokens in SQLite.

mod schema;

pub use schema::*;

use crate::dialog::TurnState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Refusing to store in-flight state for conversation {0}")]
    UnsettledState(String),
    #[error("Database connection poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Turn State ====================

    /// Load the stored turn state; missing or unreadable rows read as `Empty`
    pub fn load_turn_state(&self, conversation_id: &str) -> DbResult<TurnState> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM turn_state WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(TurnState::Empty);
        };

        match serde_json::from_str::<TurnState>(&raw) {
            Ok(state) if state.is_settled() => Ok(state),
            Ok(state) => {
                tracing::warn!(conv_id = %conversation_id, state = state.name(), "Discarding in-flight turn state");
                Ok(TurnState::Empty)
            }
            Err(e) => {
                tracing::warn!(conv_id = %conversation_id, error = %e, "Unreadable turn state, starting fresh");
                Ok(TurnState::Empty)
            }
        }
    }

    /// Replace the stored turn state. `Empty` removes the row.
    pub fn save_turn_state(&self, conversation_id: &str, state: &TurnState) -> DbResult<()> {
        if !state.is_settled() {
            return Err(DbError::UnsettledState(conversation_id.to_string()));
        }

        let conn = self.conn()?;
        if *state == TurnState::Empty {
            conn.execute(
                "DELETE FROM turn_state WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            return Ok(());
        }

        let state_json = serde_json::to_string(state)?;
        conn.execute(
            "INSERT INTO turn_state (conversation_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![conversation_id, state_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop in-flight states left behind by a crash, and rows that are not JSON
    pub fn discard_unsettled_states(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        // CASE keeps json_extract away from malformed rows
        let removed = conn.execute(
            "DELETE FROM turn_state WHERE CASE
                WHEN json_valid(state) THEN json_extract(state, '$.type') = 'querying'
                ELSE 1
             END",
            [],
        )?;
        Ok(removed)
    }

    // ==================== Sign-in Prompts ====================

    /// Record (or refresh) the pending login prompt for a conversation
    pub fn begin_sign_in_prompt(
        &self,
        conversation_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<SignInPrompt> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sign_in_prompts (conversation_id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(conversation_id) DO UPDATE SET user_id = excluded.user_id, expires_at = excluded.expires_at",
            params![
                conversation_id,
                user_id,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(SignInPrompt {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    pub fn pending_sign_in_prompt(&self, conversation_id: &str) -> DbResult<Option<SignInPrompt>> {
        let conn = self.conn()?;
        let prompt = conn
            .query_row(
                "SELECT conversation_id, user_id, expires_at FROM sign_in_prompts WHERE conversation_id = ?1",
                params![conversation_id],
                |row| {
                    Ok(SignInPrompt {
                        conversation_id: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(prompt)
    }

    /// Remove the pending prompt; returns whether one existed
    pub fn end_sign_in_prompt(&self, conversation_id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sign_in_prompts WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn purge_expired_prompts(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sign_in_prompts WHERE expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    // ==================== User Tokens ====================

    pub fn save_user_token(&self, token: &UserToken) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_tokens (user_id, connection_name, token, expires_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, connection_name) DO UPDATE SET
                token = excluded.token, expires_at = excluded.expires_at, updated_at = excluded.updated_at",
            params![
                token.user_id,
                token.connection_name,
                token.token,
                token.expires_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Fetch a token that is still valid at `now`
    pub fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<UserToken>> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                "SELECT user_id, connection_name, token, expires_at FROM user_tokens
                 WHERE user_id = ?1 AND connection_name = ?2",
                params![user_id, connection_name],
                |row| {
                    Ok(UserToken {
                        user_id: row.get(0)?,
                        connection_name: row.get(1)?,
                        token: row.get(2)?,
                        expires_at: row
                            .get::<_, Option<String>>(3)?
                            .map(|s| parse_datetime(&s)),
                    })
                },
            )
            .optional()?;
        Ok(token.filter(|t| t.is_valid(now)))
    }

    pub fn delete_user_token(&self, user_id: &str, connection_name: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_tokens WHERE user_id = ?1 AND connection_name = ?2",
            params![user_id, connection_name],
        )?;
        Ok(deleted > 0)
    }
}

/// Unparsable timestamps read as the epoch so they count as expired
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or(DateTime::UNIX_EPOCH, |dt| dt.with_timezone(&Utc))
}

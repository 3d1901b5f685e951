use crate::{error::ApiError, message::Message, user::User};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// SQLite-backed message store and user directory.
///
/// Durability of `append_message` comes from the INSERT committing before
/// the call returns; delivery is routed only after that.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// In-memory store for tests and local experiments. A single pooled
    /// connection, since every `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Ok(Self { pool })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                text TEXT,
                image_url TEXT,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(sender_id, receiver_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Append a message to the conversation between sender and receiver.
    ///
    /// At least one content field must be present; empty or whitespace-only
    /// text counts as absent. Id and timestamp are assigned here, never by
    /// the client.
    pub async fn append_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        image_url: Option<String>,
    ) -> Result<Message, ApiError> {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        if text.is_none() && image_url.is_none() {
            return Err(ApiError::EmptyMessage);
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text,
            image_url,
            created_at: Utc::now(),
        };

        self.insert_message(&message).await?;

        Ok(message)
    }

    async fn insert_message(&self, msg: &Message) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, text, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&msg.id)
        .bind(&msg.sender_id)
        .bind(&msg.receiver_id)
        .bind(&msg.text)
        .bind(&msg.image_url)
        .bind(msg.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All messages exchanged between the two users, in chat order
    /// (`created_at` ascending). Symmetric in its arguments.
    pub async fn list_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, text, image_url, created_at
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?)
               OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(Message {
                id: row.try_get("id")?,
                sender_id: row.try_get("sender_id")?,
                receiver_id: row.try_get("receiver_id")?,
                text: row.try_get("text")?,
                image_url: row.try_get("image_url")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(messages)
    }

    /// Timestamp of the most recent message between the two users, if any.
    pub async fn last_activity(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        let row = sqlx::query(
            r#"
            SELECT created_at
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?)
               OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("created_at")?)),
            None => Ok(None),
        }
    }

    /// Directory candidates for a viewer's sidebar: everyone but the viewer,
    /// in stable registration order.
    pub async fn list_users_except(&self, viewer_id: &str) -> Result<Vec<User>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, created_at
            FROM users
            WHERE id != ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(users)
    }

    /// Save or update a directory entry. Called by the auth collaborator
    /// that owns the user directory.
    pub async fn upsert_user(&self, user: &User) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Test-only append with a caller-chosen timestamp.
    #[cfg(test)]
    pub(crate) async fn append_message_at(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message, ApiError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: Some(text.to_string()),
            image_url: None,
            created_at,
        };
        self.insert_message(&message).await?;
        Ok(message)
    }
}

//! SQLite storage for per-user filter thresholds.

use async_trait::async_trait;
use poolwatch_core::{SettingsUpdate, UserSettings};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Read and write access to user thresholds.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Stored thresholds for a user, or `None` if the user never saved any.
    async fn get(&self, user_id: i64) -> Result<Option<UserSettings>, DbError>;

    /// Write a full row for the user. Fields missing from `update` keep the
    /// stored value, or the default when the user has no row yet.
    async fn upsert(&self, user_id: i64, update: &SettingsUpdate)
        -> Result<UserSettings, DbError>;
}

/// Database connection for user settings.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Each in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                min_tvl REAL NOT NULL DEFAULT 0,
                max_tvl REAL NOT NULL DEFAULT 1000000,
                min_fees REAL NOT NULL DEFAULT 0,
                max_fees REAL NOT NULL DEFAULT 100,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get settings for a user.
    pub async fn get_settings(&self, user_id: i64) -> Result<Option<UserSettings>, DbError> {
        let row = sqlx::query_as::<_, (i64, f64, f64, f64, f64)>(
            "SELECT user_id, min_tvl, max_tvl, min_fees, max_fees FROM user_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(user_id, min_tvl, max_tvl, min_fees, max_fees)| UserSettings {
                user_id,
                min_tvl,
                max_tvl,
                min_fees,
                max_fees,
            },
        ))
    }

    /// Insert or replace the full settings row.
    pub async fn save_settings(&self, settings: &UserSettings) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO user_settings (user_id, min_tvl, max_tvl, min_fees, max_fees, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(settings.user_id)
        .bind(settings.min_tvl)
        .bind(settings.max_tvl)
        .bind(settings.min_fees)
        .bind(settings.max_fees)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Merge a partial update over the stored row (or defaults) and save it.
    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> Result<UserSettings, DbError> {
        let mut settings = self
            .get_settings(user_id)
            .await?
            .unwrap_or_else(|| UserSettings::new(user_id));
        settings.apply(update);
        self.save_settings(&settings).await?;

        debug!(
            user_id = user_id,
            min_tvl = settings.min_tvl,
            max_tvl = settings.max_tvl,
            min_fees = settings.min_fees,
            max_fees = settings.max_fees,
            "Saved user settings"
        );
        Ok(settings)
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn get(&self, user_id: i64) -> Result<Option<UserSettings>, DbError> {
        self.get_settings(user_id).await
    }

    async fn upsert(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> Result<UserSettings, DbError> {
        self.update_settings(user_id, update).await
    }
}

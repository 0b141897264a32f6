//! Telegram pool alerts.
//!
//! This crate provides:
//! - SQLite-based per-user threshold storage
//! - Telegram bot commands and the settings menu
//! - The fetch, filter, diff and notify cycle

pub mod db;
pub mod notifier;
pub mod telegram;

pub use db::{Database, DbError, SettingsStore};
pub use notifier::{format_pool_message, AlertSink, CycleReport, Notifier, NotifierError};
pub use telegram::{Command, TelegramBot, TelegramError};

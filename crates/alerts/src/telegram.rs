//! Telegram bot handlers.

use crate::db::SettingsStore;
use crate::notifier::{AlertSink, CycleReport, Notifier};
use async_trait::async_trait;
use dashmap::DashMap;
use poolwatch_core::{SettingField, SettingsUpdate, UserSettings};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use thiserror::Error;
use tracing::{error, info, warn};

/// Callback data prefix for the settings menu buttons.
const SET_PREFIX: &str = "set:";

/// Reply sent when the settings store cannot be read or written.
const STORAGE_UNAVAILABLE: &str = "Settings storage unavailable, try again.";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Check for new pools now")]
    Check,
    #[command(description = "Edit TVL and fee thresholds")]
    Settings,
    #[command(description = "Show help")]
    Help,
}

/// Rejected threshold input.
#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("value must be zero or greater")]
    Negative,
}

/// Parse a threshold typed by the user. Thousands separators are allowed.
pub fn parse_threshold(text: &str) -> Result<f64, InputError> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    let value = cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::NotANumber(text.trim().to_string()))?;

    if value < 0.0 {
        return Err(InputError::Negative);
    }
    Ok(value)
}

/// Settings menu keyboard: one button per threshold.
pub fn settings_keyboard() -> InlineKeyboardMarkup {
    let button = |field: SettingField| {
        InlineKeyboardButton::callback(field.label(), format!("{SET_PREFIX}{}", field.key()))
    };
    InlineKeyboardMarkup::new(vec![
        vec![button(SettingField::MinTvl), button(SettingField::MaxTvl)],
        vec![button(SettingField::MinFees), button(SettingField::MaxFees)],
    ])
}

/// Threshold named by a settings menu callback.
pub fn parse_callback(data: &str) -> Option<SettingField> {
    data.strip_prefix(SET_PREFIX).and_then(SettingField::from_key)
}

/// Render the current thresholds.
pub fn format_settings(settings: Option<&UserSettings>) -> String {
    match settings {
        Some(s) => {
            let mut text = format!(
                "<b>Current Settings</b>\n\n\
                 Min TVL: {}\n\
                 Max TVL: {}\n\
                 Min Fees: {}\n\
                 Max Fees: {}",
                s.min_tvl, s.max_tvl, s.min_fees, s.max_fees
            );
            if s.min_tvl > s.max_tvl || s.min_fees > s.max_fees {
                text.push_str("\n\n⚠️ A minimum is above its maximum, so no pool can match.");
            }
            text
        }
        None => "<b>Current Settings</b>\n\nNo thresholds saved: every pool matches.".to_string(),
    }
}

/// Chat a settings menu callback belongs to.
///
/// Pending input and settings are keyed by chat, so a button tapped in a group
/// is matched with the value typed in that group. Falls back to the sender when
/// the menu message is no longer available.
fn callback_chat(q: &CallbackQuery) -> ChatId {
    q.message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id))
}

fn help_text() -> String {
    format!(
        "{}\n\n\
         Open /settings and tap a threshold, then send a number to set it.\n\
         New pools matching your thresholds are sent as they appear.",
        Command::descriptions()
    )
}

#[async_trait]
impl AlertSink for Bot {
    async fn send_alert(&self, chat_id: i64, message: &str) -> Result<(), TelegramError> {
        self.send_message(ChatId(chat_id), message)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    store: Arc<dyn SettingsStore>,
    notifier: Arc<Notifier>,
    /// Threshold each user picked from the menu and has not yet sent a value for.
    pending: DashMap<i64, SettingField>,
}

impl TelegramBot {
    pub fn new(bot: Bot, store: Arc<dyn SettingsStore>, notifier: Arc<Notifier>) -> Self {
        Self {
            bot,
            store,
            notifier,
            pending: DashMap::new(),
        }
    }

    /// Threshold waiting for input from this user.
    pub fn pending_field(&self, user_id: i64) -> Option<SettingField> {
        self.pending.get(&user_id).map(|f| *f)
    }

    /// Remember which threshold the user's next text message sets.
    pub fn select_field(&self, user_id: i64, field: SettingField) {
        self.pending.insert(user_id, field);
    }

    /// Apply a typed value to the pending threshold.
    ///
    /// Invalid input leaves both the stored settings and the pending
    /// selection untouched so the user can try again. So does a storage
    /// failure.
    pub async fn apply_input(&self, user_id: i64, text: &str) -> String {
        let Some(field) = self.pending_field(user_id) else {
            return "Pick a threshold from /settings first.".to_string();
        };

        let value = match parse_threshold(text) {
            Ok(value) => value,
            Err(e) => {
                return format!(
                    "Invalid value: {}.\nEnter a number for {}:",
                    html::escape(&e.to_string()),
                    field.label()
                )
            }
        };

        let settings = match self
            .store
            .upsert(user_id, &SettingsUpdate::single(field, value))
            .await
        {
            Ok(settings) => settings,
            Err(e) => {
                error!(user_id = user_id, field = field.key(), error = %e, "Failed to save threshold");
                return STORAGE_UNAVAILABLE.to_string();
            }
        };
        self.pending.remove(&user_id);

        info!(user_id = user_id, field = field.key(), value = value, "Threshold updated");
        format!(
            "{} set to {}\n\n{}",
            field.label(),
            value,
            format_settings(Some(&settings))
        )
    }

    /// Run one detection cycle for the chat and describe the outcome.
    pub async fn check_reply(&self, user_id: i64) -> String {
        match self.notifier.track_new_pools(user_id).await {
            Ok(CycleReport::Skipped) => "Could not fetch pools right now. Try again later.".to_string(),
            Ok(CycleReport::Checked { new: 0, matched, .. }) => {
                format!("No new pools. {} pools match your thresholds.", matched)
            }
            Ok(CycleReport::Checked { new, sent, .. }) => {
                format!("Found {} new pools, sent {} alerts.", new, sent)
            }
            Err(e) => {
                error!(user_id = user_id, error = %e, "Pool check failed");
                STORAGE_UNAVAILABLE.to_string()
            }
        }
    }

    /// Current thresholds, or `None` when the store could not be read.
    pub async fn settings_reply(&self, user_id: i64) -> Option<String> {
        match self.store.get(user_id).await {
            Ok(settings) => Some(format_settings(settings.as_ref())),
            Err(e) => {
                error!(user_id = user_id, error = %e, "Failed to load settings");
                None
            }
        }
    }

    /// Select a threshold from the menu and build the input prompt.
    pub async fn begin_input(&self, user_id: i64, field: SettingField) -> String {
        self.select_field(user_id, field);

        match self.store.get(user_id).await {
            Ok(settings) => {
                let current = settings
                    .unwrap_or_else(|| UserSettings::new(user_id))
                    .get(field);
                format!("Enter a value for {} (current: {}):", field.label(), current)
            }
            Err(e) => {
                error!(user_id = user_id, error = %e, "Failed to load settings");
                format!("Enter a value for {}:", field.label())
            }
        }
    }

    /// Run the bot update handler.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();

        let commands = {
            let this = Arc::clone(&self);
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&this);
                async move { this.handle_command(bot, msg, cmd).await }
            }
        };
        let texts = {
            let this = Arc::clone(&self);
            move |bot: Bot, msg: Message| {
                let this = Arc::clone(&this);
                async move { this.handle_text(bot, msg).await }
            }
        };
        let callbacks = {
            let this = Arc::clone(&self);
            move |bot: Bot, q: CallbackQuery| {
                let this = Arc::clone(&this);
                async move { this.handle_callback(bot, q).await }
            }
        };

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .branch(dptree::entry().filter_command::<Command>().endpoint(commands))
                    .branch(dptree::endpoint(texts)),
            )
            .branch(Update::filter_callback_query().endpoint(callbacks));

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        let user_id = msg.chat.id.0;

        match cmd {
            Command::Start => {
                bot.send_message(
                    msg.chat.id,
                    "Pool watch bot is ready.\n\n\
                     Use /settings to set TVL and fee thresholds and /check to look for new pools.",
                )
                .await?;
            }

            Command::Check => {
                let text = self.check_reply(user_id).await;
                bot.send_message(msg.chat.id, text).await?;
            }

            Command::Settings => match self.settings_reply(user_id).await {
                Some(text) => {
                    bot.send_message(msg.chat.id, text)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(settings_keyboard())
                        .await?;
                }
                None => {
                    bot.send_message(msg.chat.id, STORAGE_UNAVAILABLE).await?;
                }
            },

            Command::Help => {
                bot.send_message(msg.chat.id, help_text()).await?;
            }
        }

        Ok(())
    }

    async fn handle_text(&self, bot: Bot, msg: Message) -> Result<(), TelegramError> {
        let Some(text) = msg.text() else {
            return Ok(());
        };

        if text.starts_with('/') {
            bot.send_message(msg.chat.id, "Unknown command. Use /help.")
                .await?;
            return Ok(());
        }

        let reply = self.apply_input(msg.chat.id.0, text).await;
        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn handle_callback(&self, bot: Bot, q: CallbackQuery) -> Result<(), TelegramError> {
        let chat_id = callback_chat(&q);

        let Some(field) = q.data.as_deref().and_then(parse_callback) else {
            warn!(data = ?q.data, "Unknown callback data");
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        };

        bot.answer_callback_query(q.id.clone()).await?;
        let prompt = self.begin_input(chat_id.0, field).await;
        bot.send_message(chat_id, prompt).await?;

        Ok(())
    }
}

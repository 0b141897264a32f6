//! Per-user filter thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_MIN_TVL: f64 = 0.0;
pub const DEFAULT_MAX_TVL: f64 = 1_000_000.0;
pub const DEFAULT_MIN_FEES: f64 = 0.0;
pub const DEFAULT_MAX_FEES: f64 = 100.0;

/// User filter thresholds stored in the settings table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Telegram user (or chat) identifier
    pub user_id: i64,
    pub min_tvl: f64,
    pub max_tvl: f64,
    pub min_fees: f64,
    pub max_fees: f64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_id: 0,
            min_tvl: DEFAULT_MIN_TVL,
            max_tvl: DEFAULT_MAX_TVL,
            min_fees: DEFAULT_MIN_FEES,
            max_fees: DEFAULT_MAX_FEES,
        }
    }
}

impl UserSettings {
    /// Default thresholds for a user that has never saved any.
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Overlay the supplied fields of an update.
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.min_tvl {
            self.min_tvl = v;
        }
        if let Some(v) = update.max_tvl {
            self.max_tvl = v;
        }
        if let Some(v) = update.min_fees {
            self.min_fees = v;
        }
        if let Some(v) = update.max_fees {
            self.max_fees = v;
        }
    }

    pub fn get(&self, field: SettingField) -> f64 {
        match field {
            SettingField::MinTvl => self.min_tvl,
            SettingField::MaxTvl => self.max_tvl,
            SettingField::MinFees => self.min_fees,
            SettingField::MaxFees => self.max_fees,
        }
    }
}

/// Partial settings write. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub min_tvl: Option<f64>,
    pub max_tvl: Option<f64>,
    pub min_fees: Option<f64>,
    pub max_fees: Option<f64>,
}

impl SettingsUpdate {
    /// Update touching exactly one threshold.
    pub fn single(field: SettingField, value: f64) -> Self {
        let mut update = Self::default();
        match field {
            SettingField::MinTvl => update.min_tvl = Some(value),
            SettingField::MaxTvl => update.max_tvl = Some(value),
            SettingField::MinFees => update.min_fees = Some(value),
            SettingField::MaxFees => update.max_fees = Some(value),
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.min_tvl.is_none()
            && self.max_tvl.is_none()
            && self.min_fees.is_none()
            && self.max_fees.is_none()
    }
}

/// One of the four editable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    MinTvl,
    MaxTvl,
    MinFees,
    MaxFees,
}

impl SettingField {
    pub const ALL: [SettingField; 4] = [
        SettingField::MinTvl,
        SettingField::MaxTvl,
        SettingField::MinFees,
        SettingField::MaxFees,
    ];

    /// Column name and callback key.
    pub fn key(self) -> &'static str {
        match self {
            SettingField::MinTvl => "min_tvl",
            SettingField::MaxTvl => "max_tvl",
            SettingField::MinFees => "min_fees",
            SettingField::MaxFees => "max_fees",
        }
    }

    /// Label shown on menu buttons.
    pub fn label(self) -> &'static str {
        match self {
            SettingField::MinTvl => "Min TVL",
            SettingField::MaxTvl => "Max TVL",
            SettingField::MinFees => "Min Fees",
            SettingField::MaxFees => "Max Fees",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

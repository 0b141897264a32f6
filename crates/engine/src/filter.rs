//! Threshold filtering.

use poolwatch_core::{Pool, UserSettings};

/// Inclusive TVL and fee bounds derived from a user's settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdFilter {
    pub min_tvl: f64,
    pub max_tvl: f64,
    pub min_fees: f64,
    pub max_fees: f64,
}

impl Default for ThresholdFilter {
    /// Unbounded `[0, +inf]` on both metrics.
    fn default() -> Self {
        Self {
            min_tvl: 0.0,
            max_tvl: f64::INFINITY,
            min_fees: 0.0,
            max_fees: f64::INFINITY,
        }
    }
}

impl From<&UserSettings> for ThresholdFilter {
    fn from(settings: &UserSettings) -> Self {
        Self {
            min_tvl: settings.min_tvl,
            max_tvl: settings.max_tvl,
            min_fees: settings.min_fees,
            max_fees: settings.max_fees,
        }
    }
}

impl ThresholdFilter {
    /// Bounds for a user. Users without stored settings are unbounded.
    pub fn for_settings(settings: Option<&UserSettings>) -> Self {
        settings.map(Self::from).unwrap_or_default()
    }

    /// Check whether a pool sits inside both ranges. Missing values compare as 0.
    #[inline]
    pub fn matches(&self, pool: &Pool) -> bool {
        let tvl = pool.tvl_or_zero();
        let fees = pool.fees_or_zero();
        (self.min_tvl..=self.max_tvl).contains(&tvl)
            && (self.min_fees..=self.max_fees).contains(&fees)
    }

    /// Keep matching pools, preserving upstream order.
    pub fn apply(&self, pools: &[Pool]) -> Vec<Pool> {
        pools.iter().filter(|p| self.matches(p)).cloned().collect()
    }
}

//! Pool listing records returned by the upstream market-data API.

use compact_str::CompactString;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// A liquidity pool as listed by the upstream API.
///
/// Every field is optional on the wire. Two pools are the same pool only if
/// every field matches, so equality is derived over the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    #[serde(default, alias = "pairName", alias = "name", deserialize_with = "lenient_compact")]
    pub pair_name: Option<CompactString>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, alias = "tokenAddress", deserialize_with = "lenient_string")]
    pub token_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_compact")]
    pub age: Option<CompactString>,
    #[serde(default, alias = "marketCap", deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tvl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    #[serde(default, alias = "binStep", deserialize_with = "lenient_u32")]
    pub bin_step: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fees: Option<f64>,
    #[serde(default, alias = "dynamicFee", deserialize_with = "lenient_f64")]
    pub dynamic_fee: Option<f64>,
    #[serde(default, alias = "printRate", deserialize_with = "lenient_f64")]
    pub print_rate: Option<f64>,
}

impl Pool {
    /// TVL used for threshold comparison (absent counts as zero).
    #[inline]
    pub fn tvl_or_zero(&self) -> f64 {
        self.tvl.unwrap_or(0.0)
    }

    /// Fees used for threshold comparison (absent counts as zero).
    #[inline]
    pub fn fees_or_zero(&self) -> f64 {
        self.fees.unwrap_or(0.0)
    }

    /// Short human label for logs.
    pub fn label(&self) -> &str {
        self.pair_name
            .as_deref()
            .or(self.address.as_deref())
            .unwrap_or("unknown")
    }
}

/// Wire value that may carry a number as either a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Number(n)) => Some(n),
        Some(Lenient::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(Lenient::Other(_)) | None => None,
    }
    .filter(|n| n.is_finite()))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Text(s)) if !s.is_empty() => Some(s),
        Some(Lenient::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_compact<'de, D>(deserializer: D) -> Result<Option<CompactString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.map(CompactString::from))
}

//! Sale configuration.
//!
//! Loaded from TOML or JSON (by file extension) with serde; missing fields fall
//! back to the parameters of the Ubermensch pre-ICO deployment. Large amounts
//! (anything beyond a signed 64-bit integer, e.g. a funding goal in wei) may be
//! written as decimal strings.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ubermensch_token::{
    math::{mul_div_round_half_up, pow10, safe_add, safe_mul},
    Address, Balance, ErrorKind, MathError,
};

use crate::bonus::{TimeBonus, VolumeBonus, BPS_DENOM};

/// Smallest native units per whole coin (wei per ether).
pub const NATIVE_UNIT: Balance = 1_000_000_000_000_000_000;

/// Default sale length.
pub const DEFAULT_DURATION_SECS: u64 = 10 * 24 * 3_600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// An unreadable file is a missing resource; a config that fails to parse
    /// or validate leaves the sale in a state it cannot be built from.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io(_) => ErrorKind::Resource,
            ConfigError::Parse(_) | ConfigError::Invalid(_) => ErrorKind::State,
        }
    }
}

/// Token price as native smallest units per one whole token: `num / den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    #[serde(with = "amount")]
    pub num: Balance,
    #[serde(with = "amount")]
    pub den: Balance,
}

impl Price {
    pub fn new(num: Balance, den: Balance) -> Result<Self, ConfigError> {
        if num == 0 || den == 0 {
            return Err(ConfigError::Invalid("price num/den must be > 0".into()));
        }
        Ok(Self { num, den })
    }
}

impl Default for Price {
    /// 0.00125 native coin per token.
    fn default() -> Self {
        Self { num: 1_250_000_000_000_000, den: 1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresaleConfig {
    /// Receives raised funds; the only identity allowed to start early,
    /// halt, manage oracles and finalize.
    pub beneficiary: Address,
    /// Scheduled start (UNIX seconds). Also anchors the time bonus.
    pub starts_at: u64,
    pub ends_at: u64,
    #[serde(with = "amount")]
    pub funding_goal: Balance,
    /// Cap on tokens sold, in smallest token units.
    #[serde(with = "amount")]
    pub maximum_sellable_tokens: Balance,
    pub price: Price,
    pub token_decimals: u8,
    #[serde(with = "amount")]
    pub native_unit: Balance,
    pub time_bonus: TimeBonus,
    pub volume_bonus: VolumeBonus,
    pub event_capacity: usize,
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            beneficiary: Address::default(),
            starts_at: 0,
            ends_at: DEFAULT_DURATION_SECS,
            funding_goal: 100 * NATIVE_UNIT,
            maximum_sellable_tokens: 1_000_000_000 * 100_000_000,
            price: Price::default(),
            token_decimals: 8,
            native_unit: NATIVE_UNIT,
            time_bonus: TimeBonus::default(),
            volume_bonus: VolumeBonus::default(),
            event_capacity: 1024,
        }
    }
}

impl PresaleConfig {
    /// Default parameters with the given beneficiary and window.
    pub fn new(beneficiary: Address, starts_at: u64, ends_at: u64) -> Self {
        Self { beneficiary, starts_at, ends_at, ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beneficiary == Address::default() {
            return Err(ConfigError::Invalid("beneficiary must be set".into()));
        }
        if self.ends_at <= self.starts_at {
            return Err(ConfigError::Invalid("ends_at <= starts_at".into()));
        }
        if self.funding_goal == 0 {
            return Err(ConfigError::Invalid("funding goal must be > 0".into()));
        }
        if self.maximum_sellable_tokens == 0 {
            return Err(ConfigError::Invalid("maximum sellable tokens must be > 0".into()));
        }
        if self.native_unit == 0 {
            return Err(ConfigError::Invalid("native unit must be > 0".into()));
        }
        Price::new(self.price.num, self.price.den)?;
        pow10(self.token_decimals as u32).map_err(|_| ConfigError::Invalid("token decimals too large".into()))?;
        self.time_bonus.validate()?;
        self.volume_bonus.validate()?;
        Ok(())
    }

    /// Token units for `value` native units at `bonus_bps` on top of the base
    /// price, rounded half up.
    pub fn tokens_for(&self, value: Balance, bonus_bps: u32) -> Result<Balance, MathError> {
        let rate = safe_add(BPS_DENOM as Balance, bonus_bps as Balance)?;
        let scale = safe_mul(pow10(self.token_decimals as u32)?, self.price.den)?;
        let denom = safe_mul(BPS_DENOM as Balance, self.price.num)?;
        mul_div_round_half_up(safe_mul(value, rate)?, scale, denom)
    }

    /// Load from `.toml` or `.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let cfg: Self = match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => toml::from_str(&text).map_err(|e| ConfigError::Parse(format!("toml parse: {e}")))?,
            Some("json") => {
                serde_json::from_str(&text).map_err(|e| ConfigError::Parse(format!("json parse: {e}")))?
            }
            _ => return Err(ConfigError::Parse("unknown config format".into())),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// u128 amounts as integers or decimal strings; written back as strings.
mod amount {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        struct V;
        impl<'de> de::Visitor<'de> for V {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }
            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom("negative amount"))
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.trim().replace('_', "").parse().map_err(E::custom)
            }
        }
        d.deserialize_any(V)
    }
}

//! Bonus curves applied on top of the base token price.
//!
//! Two step schedules, both in basis points (1% = 100 bps):
//! - time bonus: descending in seconds elapsed since the scheduled start
//! - volume bonus: ascending in the size of a single contribution
//!
//! The total bonus is the sum of both (additive, not compounded).

use serde::{Deserialize, Serialize};
use ubermensch_token::Balance;

use crate::config::ConfigError;

/// Basis points denominator (100% == 10_000 bps).
pub const BPS_DENOM: u32 = 10_000;

const HOUR: u64 = 3_600;
const DAY: u64 = 24 * HOUR;

/// Applies while `elapsed < until_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTier {
    pub until_secs: u64,
    pub bonus_bps: u32,
}

/// Applies when the contribution is at least `min_units` whole native units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTier {
    pub min_units: u64,
    pub bonus_bps: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBonus {
    /// Ascending by `until_secs`.
    pub tiers: Vec<TimeTier>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBonus {
    /// Ascending by `min_units`.
    pub tiers: Vec<VolumeTier>,
}

impl Default for TimeBonus {
    /// 50% for the first 12h, 30% until 36h, 20% until day 4, 10% until
    /// day 7, 5% until day 10, nothing afterwards.
    fn default() -> Self {
        let t = |until_secs, bonus_bps| TimeTier { until_secs, bonus_bps };
        Self {
            tiers: vec![
                t(12 * HOUR, 5_000),
                t(36 * HOUR, 3_000),
                t(4 * DAY, 2_000),
                t(7 * DAY, 1_000),
                t(10 * DAY, 500),
            ],
        }
    }
}

impl Default for VolumeBonus {
    /// 3% from 1 unit, 7% from 5, 12% from 10, 20% from 50.
    fn default() -> Self {
        let v = |min_units, bonus_bps| VolumeTier { min_units, bonus_bps };
        Self { tiers: vec![v(1, 300), v(5, 700), v(10, 1_200), v(50, 2_000)] }
    }
}

impl TimeBonus {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for t in &self.tiers {
            if t.bonus_bps > BPS_DENOM {
                return Err(ConfigError::Invalid("time bonus above 100%".into()));
            }
        }
        for w in self.tiers.windows(2) {
            if w[1].until_secs <= w[0].until_secs {
                return Err(ConfigError::Invalid("time tiers must be strictly ascending".into()));
            }
            if w[1].bonus_bps > w[0].bonus_bps {
                return Err(ConfigError::Invalid("time bonus must not grow with elapsed time".into()));
            }
        }
        Ok(())
    }

    pub fn bonus_bps(&self, elapsed_secs: u64) -> u32 {
        self.tiers
            .iter()
            .find(|t| elapsed_secs < t.until_secs)
            .map_or(0, |t| t.bonus_bps)
    }
}

impl VolumeBonus {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for t in &self.tiers {
            if t.bonus_bps > BPS_DENOM {
                return Err(ConfigError::Invalid("volume bonus above 100%".into()));
            }
        }
        for w in self.tiers.windows(2) {
            if w[1].min_units <= w[0].min_units {
                return Err(ConfigError::Invalid("volume tiers must be strictly ascending".into()));
            }
            if w[1].bonus_bps < w[0].bonus_bps {
                return Err(ConfigError::Invalid("volume bonus must not shrink with size".into()));
            }
        }
        Ok(())
    }

    /// Bonus for `amount` smallest units, with `native_unit` smallest units
    /// per whole coin. Lower bounds are inclusive.
    pub fn bonus_bps(&self, amount: Balance, native_unit: Balance) -> u32 {
        self.tiers
            .iter()
            .rev()
            .find(|t| (t.min_units as u128).checked_mul(native_unit).map_or(false, |min| amount >= min))
            .map_or(0, |t| t.bonus_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ETHER: Balance = 1_000_000_000_000_000_000;

    #[test]
    fn time_schedule_steps() {
        let s = TimeBonus::default();
        assert_eq!(s.bonus_bps(0), 5_000);
        assert_eq!(s.bonus_bps(60), 5_000);
        assert_eq!(s.bonus_bps(12 * HOUR - 1), 5_000);
        assert_eq!(s.bonus_bps(12 * HOUR), 3_000);
        assert_eq!(s.bonus_bps(12 * HOUR + 300), 3_000);
        assert_eq!(s.bonus_bps(36 * HOUR + 300), 2_000);
        assert_eq!(s.bonus_bps(4 * DAY + 12 * HOUR), 1_000);
        assert_eq!(s.bonus_bps(7 * DAY + 12 * HOUR), 500);
        assert_eq!(s.bonus_bps(10 * DAY), 0);
        assert_eq!(s.bonus_bps(u64::MAX), 0);
    }

    #[test]
    fn volume_schedule_inclusive_bounds() {
        let s = VolumeBonus::default();
        assert_eq!(s.bonus_bps(ETHER / 2, ETHER), 0);
        assert_eq!(s.bonus_bps(ETHER - 1, ETHER), 0);
        assert_eq!(s.bonus_bps(ETHER, ETHER), 300);
        assert_eq!(s.bonus_bps(ETHER + ETHER / 2, ETHER), 300);
        assert_eq!(s.bonus_bps(5 * ETHER, ETHER), 700);
        assert_eq!(s.bonus_bps(10 * ETHER, ETHER), 1_200);
        assert_eq!(s.bonus_bps(11 * ETHER, ETHER), 1_200);
        assert_eq!(s.bonus_bps(50 * ETHER, ETHER), 2_000);
        assert_eq!(s.bonus_bps(u128::MAX, ETHER), 2_000);
    }

    #[test]
    fn validation_rejects_non_monotonic_tiers() {
        assert!(TimeBonus::default().validate().is_ok());
        assert!(VolumeBonus::default().validate().is_ok());

        let mut t = TimeBonus::default();
        t.tiers[1].bonus_bps = 6_000;
        assert!(t.validate().is_err());
        let mut t = TimeBonus::default();
        t.tiers[1].until_secs = t.tiers[0].until_secs;
        assert!(t.validate().is_err());

        let mut v = VolumeBonus::default();
        v.tiers[2].bonus_bps = 100;
        assert!(v.validate().is_err());
        let mut v = VolumeBonus::default();
        v.tiers[3].bonus_bps = 20_000;
        assert!(v.validate().is_err());
    }

    proptest! {
        #[test]
        fn time_bonus_never_grows(a in any::<u64>(), b in any::<u64>()) {
            let s = TimeBonus::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.bonus_bps(lo) >= s.bonus_bps(hi));
        }

        #[test]
        fn volume_bonus_never_shrinks(a in any::<u128>(), b in any::<u128>()) {
            let s = VolumeBonus::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.bonus_bps(lo, ETHER) <= s.bonus_bps(hi, ETHER));
        }
    }
}

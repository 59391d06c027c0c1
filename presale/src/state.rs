//! Sale state, recomputed on demand.
//!
//! The state is never stored. It is derived from the clock reading, the
//! raised/sold counters and the few flags set by explicit transitions
//! (early start moves `starts_at`, finalize and refund set flags).

use std::fmt;

use serde::{Deserialize, Serialize};
use ubermensch_token::Balance;

/// Wire codes 1..=7; 0 is reserved for "unknown".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SaleState {
    /// Engine not yet authorized to mint on its ledger.
    Preparing = 1,
    PreFunding = 2,
    Funding = 3,
    Success = 4,
    Failure = 5,
    Finalized = 6,
    Refunding = 7,
}

impl SaleState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SaleState {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        Ok(match v {
            1 => SaleState::Preparing,
            2 => SaleState::PreFunding,
            3 => SaleState::Funding,
            4 => SaleState::Success,
            5 => SaleState::Failure,
            6 => SaleState::Finalized,
            7 => SaleState::Refunding,
            other => return Err(other),
        })
    }
}

impl fmt::Display for SaleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything the state depends on, captured at one instant.
#[derive(Clone, Copy, Debug)]
pub struct StateInputs {
    pub now: u64,
    pub starts_at: u64,
    pub ends_at: u64,
    pub funding_goal: Balance,
    pub wei_raised: Balance,
    pub tokens_sold: Balance,
    pub maximum_sellable_tokens: Balance,
    /// Engine holds minting rights on its ledger. Only consulted before the
    /// sale opens; once open the state never falls back to Preparing.
    pub wired: bool,
    pub finalized: bool,
    pub refunding: bool,
}

pub fn resolve(i: &StateInputs) -> SaleState {
    if i.finalized {
        SaleState::Finalized
    } else if i.now < i.starts_at {
        if i.wired {
            SaleState::PreFunding
        } else {
            SaleState::Preparing
        }
    } else if i.now <= i.ends_at && i.tokens_sold < i.maximum_sellable_tokens {
        SaleState::Funding
    } else if i.wei_raised >= i.funding_goal {
        SaleState::Success
    } else if i.refunding {
        SaleState::Refunding
    } else {
        SaleState::Failure
    }
}

//! Ubermensch pre-ICO crowdsale.
//!
//! Sells tokens of an [`ubermensch_token::TokenLedger`] for native currency
//! (and oracle-attested BTC) over a fixed window. Purchases earn a time bonus
//! and a volume bonus. Reaching the funding goal lets the beneficiary finalize,
//! which forwards the raise and unlocks token transfers; missing it opens
//! refunds. State is never stored: it is derived from the books and the clock
//! on every call.

#![forbid(unsafe_code)]

pub mod bonus;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod vault;

pub use bonus::{TimeBonus, TimeTier, VolumeBonus, VolumeTier, BPS_DENOM};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PresaleConfig, Price, DEFAULT_DURATION_SECS, NATIVE_UNIT};
pub use engine::{Channel, InvestorRecord, Presale, PresaleEvent, PresaleSnapshot};
pub use error::PresaleError;
pub use state::{SaleState, StateInputs};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};
pub use vault::{MemoryVault, Vault, VaultError};

//! Ubermensch token ledger.
//!
//! - Checked arithmetic guard used by every balance mutation
//! - Mint agents, one-shot release agent, transfer agents
//! - Transfer lock that can be opened once and never closed again
//! - Allowances (approve / transfer_from)
//! - Events: tokio::broadcast
//!
//! The ledger is shared behind `Arc`; all operations take `&self` and
//! serialize internally on a parking_lot RwLock.

#![forbid(unsafe_code)]

pub mod address;
pub mod error;
pub mod ledger;
pub mod math;

pub use address::{Address, AddressParseError, ADDRESS_LEN};
pub use error::ErrorKind;
pub use ledger::{LedgerError, LedgerEvent, TokenLedger, TokenMetadata, DEFAULT_EVENT_CAPACITY};
pub use math::{Balance, MathError};

use thiserror::Error;
use ubermensch_token::{ErrorKind, LedgerError, MathError};

use crate::{config::ConfigError, state::SaleState, vault::VaultError};

#[derive(Error, Debug)]
pub enum PresaleError {
    #[error("not authorized")]
    Unauthorized,
    #[error("invalid state: {0}")]
    InvalidState(SaleState),
    #[error("sale not started")]
    TooEarly,
    #[error("sale already started")]
    AlreadyStarted,
    #[error("sale already finalized")]
    AlreadyFinalized,
    #[error("sale is halted")]
    Halted,
    #[error("contribution must buy at least one token unit")]
    ZeroContribution,
    #[error("maximum sellable tokens exceeded")]
    GoalExceeded,
    #[error("nothing to refund")]
    NothingToRefund,
    #[error(transparent)]
    Math(#[from] MathError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("vault: {0}")]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PresaleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PresaleError::Unauthorized => ErrorKind::Authorization,
            PresaleError::InvalidState(_)
            | PresaleError::TooEarly
            | PresaleError::AlreadyStarted
            | PresaleError::AlreadyFinalized
            | PresaleError::Halted => ErrorKind::State,
            PresaleError::ZeroContribution
            | PresaleError::GoalExceeded
            | PresaleError::NothingToRefund
            | PresaleError::Vault(_) => ErrorKind::Resource,
            PresaleError::Math(e) => e.kind(),
            PresaleError::Ledger(e) => e.kind(),
            PresaleError::Config(e) => e.kind(),
        }
    }
}

//! Custody of the native currency received by the sale.
//!
//! All monetary side effects of the engine go through [`Vault`]: pulling a
//! contribution from the buyer, paying refunds back and forwarding the raise to
//! the beneficiary on finalization.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;
use ubermensch_token::{
    math::{safe_add, safe_sub},
    Address, Balance,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("insufficient funds")]
    Insufficient,
    #[error("vault failure: {0}")]
    Other(String),
}

pub trait Vault: Send + Sync + 'static {
    /// Move `amount` from `from` into escrow. Runs while the engine holds its
    /// books; must not call back into the engine.
    fn collect(&self, from: Address, amount: Balance) -> Result<(), VaultError>;

    /// Pay `amount` out of escrow to `to`. May call back into the engine.
    fn pay_out(&self, to: Address, amount: Balance) -> Result<(), VaultError>;
}

/// In-process vault keeping native balances per address plus the escrow.
#[derive(Debug, Default)]
pub struct MemoryVault {
    inner: Mutex<MemoryBooks>,
}

#[derive(Debug, Default)]
struct MemoryBooks {
    escrow: Balance,
    wallets: HashMap<Address, Balance>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `who` spendable native funds.
    pub fn fund(&self, who: Address, amount: Balance) -> Result<(), VaultError> {
        let mut m = self.inner.lock();
        let bal = m.wallets.get(&who).copied().unwrap_or(0);
        let bal = safe_add(bal, amount).map_err(|e| VaultError::Other(e.to_string()))?;
        m.wallets.insert(who, bal);
        Ok(())
    }

    pub fn balance_of(&self, who: Address) -> Balance {
        self.inner.lock().wallets.get(&who).copied().unwrap_or(0)
    }

    pub fn escrow(&self) -> Balance {
        self.inner.lock().escrow
    }
}

impl Vault for MemoryVault {
    fn collect(&self, from: Address, amount: Balance) -> Result<(), VaultError> {
        let mut m = self.inner.lock();
        let bal = m.wallets.get(&from).copied().unwrap_or(0);
        let new_bal = safe_sub(bal, amount).map_err(|_| VaultError::Insufficient)?;
        let new_escrow = safe_add(m.escrow, amount).map_err(|e| VaultError::Other(e.to_string()))?;
        m.wallets.insert(from, new_bal);
        m.escrow = new_escrow;
        Ok(())
    }

    fn pay_out(&self, to: Address, amount: Balance) -> Result<(), VaultError> {
        let mut m = self.inner.lock();
        let new_escrow = safe_sub(m.escrow, amount).map_err(|_| VaultError::Insufficient)?;
        let bal = m.wallets.get(&to).copied().unwrap_or(0);
        let new_bal = safe_add(bal, amount).map_err(|e| VaultError::Other(e.to_string()))?;
        m.escrow = new_escrow;
        m.wallets.insert(to, new_bal);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_conserved() {
        let v = MemoryVault::new();
        let (a, b) = (Address([1; 20]), Address([2; 20]));
        v.fund(a, 100).unwrap();
        v.collect(a, 60).unwrap();
        assert_eq!(v.collect(a, 41), Err(VaultError::Insufficient));
        v.pay_out(b, 25).unwrap();
        assert_eq!(v.pay_out(b, 36), Err(VaultError::Insufficient));
        assert_eq!(v.balance_of(a), 40);
        assert_eq!(v.balance_of(b), 25);
        assert_eq!(v.escrow(), 35);
    }
}

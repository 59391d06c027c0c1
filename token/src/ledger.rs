//! Mintable token ledger with a one-way transfer release gate.
//!
//! - Balances and total supply, mutated only through the checked math guard
//! - Mint agents: an explicit allow-list owned by the ledger owner
//! - Release agent: set once by the owner, then the only identity able to
//!   open transfers; once opened, transfers stay open
//! - Transfer agents: may move their own tokens before release
//! - ERC-20 style allowances (approve / transfer_from)
//! - Events: tokio::broadcast

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    address::Address,
    error::ErrorKind,
    math::{safe_add, safe_sub, Balance, MathError},
};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Descriptive token data, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    /// Number of fractional digits of one whole token.
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self { name: name.into(), symbol: symbol.into(), decimals }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("not authorized")]
    Unauthorized,
    #[error("already set")]
    AlreadySet,
    #[error("token transfers are locked")]
    TransfersLocked,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient allowance")]
    InsufficientAllowance,
    #[error(transparent)]
    Math(#[from] MathError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized => ErrorKind::Authorization,
            LedgerError::AlreadySet => ErrorKind::State,
            LedgerError::TransfersLocked => ErrorKind::Lock,
            LedgerError::InsufficientBalance | LedgerError::InsufficientAllowance => ErrorKind::Resource,
            LedgerError::Math(e) => e.kind(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Minted { agent: Address, to: Address, amount: Balance },
    Transfer { from: Address, to: Address, amount: Balance },
    Approval { owner: Address, spender: Address, amount: Balance },
    MintAgentChanged { agent: Address, enabled: bool },
    TransferAgentChanged { agent: Address, enabled: bool },
    ReleaseAgentSet { agent: Address },
    Released { by: Address },
}

#[derive(Default)]
struct Books {
    total_supply: Balance,
    balances: HashMap<Address, Balance>,
    allowances: HashMap<(Address, Address), Balance>,
    mint_agents: BTreeSet<Address>,
    transfer_agents: BTreeSet<Address>,
    release_agent: Option<Address>,
    released: bool,
}

impl Books {
    fn balance(&self, who: &Address) -> Balance {
        self.balances.get(who).copied().unwrap_or(0)
    }

    /// Moves `amount` from `from` to `to`; computes both sides before writing.
    fn move_balance(&mut self, from: Address, to: Address, amount: Balance) -> Result<(), LedgerError> {
        let from_bal = self.balance(&from);
        let new_from = safe_sub(from_bal, amount).map_err(|_| LedgerError::InsufficientBalance)?;
        if from == to {
            return Ok(());
        }
        let new_to = safe_add(self.balance(&to), amount)?;
        self.balances.insert(from, new_from);
        self.balances.insert(to, new_to);
        Ok(())
    }

    fn can_transfer(&self, from: &Address) -> bool {
        self.released || self.transfer_agents.contains(from)
    }
}

/// Token account book.
pub struct TokenLedger {
    owner: Address,
    metadata: TokenMetadata,
    books: RwLock<Books>,
    events_tx: broadcast::Sender<LedgerEvent>,
}

impl fmt::Debug for TokenLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.books.read();
        f.debug_struct("TokenLedger")
            .field("owner", &self.owner)
            .field("symbol", &self.metadata.symbol)
            .field("total_supply", &b.total_supply)
            .field("holders", &b.balances.len())
            .field("released", &b.released)
            .finish()
    }
}

impl TokenLedger {
    /// Empty ledger owned by `owner`; transfers start locked.
    pub fn new(owner: Address, metadata: TokenMetadata) -> Arc<Self> {
        Self::with_event_capacity(owner, metadata, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(owner: Address, metadata: TokenMetadata, event_capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(event_capacity.max(1));
        Arc::new(Self {
            owner,
            metadata,
            books: RwLock::new(Books::default()),
            events_tx: tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events_tx.subscribe()
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn total_supply(&self) -> Balance {
        self.books.read().total_supply
    }

    pub fn balance_of(&self, who: Address) -> Balance {
        self.books.read().balance(&who)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Balance {
        self.books.read().allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    pub fn is_mint_agent(&self, who: Address) -> bool {
        self.books.read().mint_agents.contains(&who)
    }

    pub fn is_transfer_agent(&self, who: Address) -> bool {
        self.books.read().transfer_agents.contains(&who)
    }

    pub fn release_agent(&self) -> Option<Address> {
        self.books.read().release_agent
    }

    pub fn transfers_locked(&self) -> bool {
        !self.books.read().released
    }

    fn require_owner(&self, caller: Address, op: &'static str) -> Result<(), LedgerError> {
        if caller != self.owner {
            warn!(%caller, op, "ledger: rejected non-owner call");
            return Err(LedgerError::Unauthorized);
        }
        Ok(())
    }

    fn emit(&self, ev: LedgerEvent) {
        let _ = self.events_tx.send(ev);
    }

    /// Grant or revoke minting rights. Owner only; idempotent.
    pub fn set_mint_agent(&self, caller: Address, agent: Address, enabled: bool) -> Result<(), LedgerError> {
        self.require_owner(caller, "set_mint_agent")?;
        let mut b = self.books.write();
        if enabled {
            b.mint_agents.insert(agent);
        } else {
            b.mint_agents.remove(&agent);
        }
        info!(%agent, enabled, "ledger: mint agent changed");
        self.emit(LedgerEvent::MintAgentChanged { agent, enabled });
        Ok(())
    }

    /// Name the single identity allowed to open transfers. Owner only, once.
    pub fn set_release_agent(&self, caller: Address, agent: Address) -> Result<(), LedgerError> {
        self.require_owner(caller, "set_release_agent")?;
        let mut b = self.books.write();
        if b.release_agent.is_some() || b.released {
            return Err(LedgerError::AlreadySet);
        }
        b.release_agent = Some(agent);
        info!(%agent, "ledger: release agent set");
        self.emit(LedgerEvent::ReleaseAgentSet { agent });
        Ok(())
    }

    /// Allow `agent` to move its own tokens before release. Owner only,
    /// and only while transfers are still locked.
    pub fn set_transfer_agent(&self, caller: Address, agent: Address, enabled: bool) -> Result<(), LedgerError> {
        self.require_owner(caller, "set_transfer_agent")?;
        let mut b = self.books.write();
        if b.released {
            return Err(LedgerError::AlreadySet);
        }
        if enabled {
            b.transfer_agents.insert(agent);
        } else {
            b.transfer_agents.remove(&agent);
        }
        self.emit(LedgerEvent::TransferAgentChanged { agent, enabled });
        Ok(())
    }

    /// Open transfers for everyone. Release agent only; a repeated release
    /// succeeds without effect.
    pub fn release_token_transfer(&self, caller: Address) -> Result<(), LedgerError> {
        let mut b = self.books.write();
        if b.release_agent != Some(caller) {
            warn!(%caller, "ledger: release attempted by non-agent");
            return Err(LedgerError::Unauthorized);
        }
        if b.released {
            return Ok(());
        }
        b.released = true;
        info!(by = %caller, "ledger: token transfers released");
        self.emit(LedgerEvent::Released { by: caller });
        Ok(())
    }

    /// Create `amount` new units for `to`. Mint agents only.
    pub fn mint(&self, caller: Address, to: Address, amount: Balance) -> Result<(), LedgerError> {
        let mut b = self.books.write();
        if !b.mint_agents.contains(&caller) {
            warn!(%caller, "ledger: mint by non-agent");
            return Err(LedgerError::Unauthorized);
        }
        let new_supply = safe_add(b.total_supply, amount)?;
        let new_bal = safe_add(b.balance(&to), amount)?;
        b.total_supply = new_supply;
        b.balances.insert(to, new_bal);
        debug!(agent = %caller, %to, amount, supply = new_supply, "ledger: minted");
        self.emit(LedgerEvent::Minted { agent: caller, to, amount });
        Ok(())
    }

    pub fn transfer(&self, from: Address, to: Address, amount: Balance) -> Result<(), LedgerError> {
        let mut b = self.books.write();
        if !b.can_transfer(&from) {
            return Err(LedgerError::TransfersLocked);
        }
        b.move_balance(from, to, amount)?;
        debug!(%from, %to, amount, "ledger: transfer");
        self.emit(LedgerEvent::Transfer { from, to, amount });
        Ok(())
    }

    /// Set the allowance of `spender` over `owner`'s tokens (overwrites).
    pub fn approve(&self, owner: Address, spender: Address, amount: Balance) -> Result<(), LedgerError> {
        let mut b = self.books.write();
        if amount == 0 {
            b.allowances.remove(&(owner, spender));
        } else {
            b.allowances.insert((owner, spender), amount);
        }
        self.emit(LedgerEvent::Approval { owner, spender, amount });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`.
    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        let mut b = self.books.write();
        if !b.can_transfer(&from) {
            return Err(LedgerError::TransfersLocked);
        }
        let allowed = b.allowances.get(&(from, spender)).copied().unwrap_or(0);
        let remaining = safe_sub(allowed, amount).map_err(|_| LedgerError::InsufficientAllowance)?;
        b.move_balance(from, to, amount)?;
        if remaining == 0 {
            b.allowances.remove(&(from, spender));
        } else {
            b.allowances.insert((from, spender), remaining);
        }
        debug!(%spender, %from, %to, amount, "ledger: transfer_from");
        self.emit(LedgerEvent::Transfer { from, to, amount });
        Ok(())
    }
}

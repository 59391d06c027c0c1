//! Pre-ICO crowdsale engine.
//!
//! Lifecycle: Preparing -> PreFunding -> Funding -> Success -> Finalized
//!                                              \-> Failure -> Refunding
//!
//! - Contributions in native currency (`buy`) or attested BTC (`invest_btc`)
//!   mint bonus-adjusted token amounts on the bound ledger
//! - Time bonus anchored at the scheduled start plus volume bonus per call
//! - Funding goal decides success; success opens token transfers, failure
//!   opens per-investor refunds of native contributions
//! - One execution lock per engine serializes every mutating call; the book
//!   lock is never held across a refund or finalize payout
//! - Events: tokio::broadcast

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use ubermensch_token::{
    math::{safe_add, safe_sub},
    Address, Balance, LedgerError, MathError, TokenLedger,
};

use crate::{
    clock::Clock,
    config::{ConfigError, PresaleConfig},
    error::PresaleError,
    state::{resolve, SaleState, StateInputs},
    vault::Vault,
};

/// Per-investor bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InvestorRecord {
    /// Refundable native contribution; zeroed by a refund.
    pub invested: Balance,
    /// Tokens minted to this investor by the sale.
    pub tokens: Balance,
}

/// How a contribution reached the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Channel {
    Native,
    /// Off-chain BTC payment attested by an oracle; never refundable here.
    Btc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresaleEvent {
    Invested { investor: Address, channel: Channel, value: Balance, tokens: Balance, bonus_bps: u32 },
    StartedEarly { at: u64 },
    Finalized { forwarded: Balance },
    Refunded { investor: Address, amount: Balance },
    Halted { halted: bool },
    OracleChanged { oracle: Address, enabled: bool },
}

/// Read-only view of the sale counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PresaleSnapshot {
    pub state: SaleState,
    pub starts_at: u64,
    pub ends_at: u64,
    pub wei_raised: Balance,
    pub wei_refunded: Balance,
    pub tokens_sold: Balance,
    pub investor_count: u64,
    pub halted: bool,
    pub finalized: bool,
}

struct Books {
    starts_at: u64,
    halted: bool,
    finalized: bool,
    refunding: bool,
    wei_raised: Balance,
    wei_refunded: Balance,
    tokens_sold: Balance,
    investor_count: u64,
    investors: HashMap<Address, InvestorRecord>,
    oracles: BTreeSet<Address>,
}

pub struct Presale {
    /// Identity of the engine on its ledger (mint and release agent).
    address: Address,
    cfg: PresaleConfig,
    token: Arc<TokenLedger>,
    clock: Arc<dyn Clock>,
    vault: Arc<dyn Vault>,
    exec: ReentrantMutex<()>,
    books: RwLock<Books>,
    events_tx: broadcast::Sender<PresaleEvent>,
}

impl fmt::Debug for Presale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.books.read();
        f.debug_struct("Presale")
            .field("address", &self.address)
            .field("beneficiary", &self.cfg.beneficiary)
            .field("wei_raised", &b.wei_raised)
            .field("tokens_sold", &b.tokens_sold)
            .field("investors", &b.investor_count)
            .finish()
    }
}

impl Presale {
    /// Bind a sale to `token`. The ledger owner still has to make `address`
    /// a mint agent (and release agent) before the sale leaves Preparing.
    pub fn new(
        address: Address,
        cfg: PresaleConfig,
        token: Arc<TokenLedger>,
        clock: Arc<dyn Clock>,
        vault: Arc<dyn Vault>,
    ) -> Result<Arc<Self>, PresaleError> {
        cfg.validate()?;
        if token.metadata().decimals != cfg.token_decimals {
            return Err(ConfigError::Invalid("token decimals differ from ledger".into()).into());
        }
        let (tx, _) = broadcast::channel(cfg.event_capacity.max(1));
        let books = Books {
            starts_at: cfg.starts_at,
            halted: false,
            finalized: false,
            refunding: false,
            wei_raised: 0,
            wei_refunded: 0,
            tokens_sold: 0,
            investor_count: 0,
            investors: HashMap::new(),
            oracles: BTreeSet::new(),
        };
        info!(%address, starts_at = cfg.starts_at, ends_at = cfg.ends_at, "presale: created");
        Ok(Arc::new(Self {
            address,
            cfg,
            token,
            clock,
            vault,
            exec: ReentrantMutex::new(()),
            books: RwLock::new(books),
            events_tx: tx,
        }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresaleEvent> {
        self.events_tx.subscribe()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &PresaleConfig {
        &self.cfg
    }

    pub fn token(&self) -> &Arc<TokenLedger> {
        &self.token
    }

    fn emit(&self, ev: PresaleEvent) {
        let _ = self.events_tx.send(ev);
    }

    fn require_beneficiary(&self, caller: Address, op: &'static str) -> Result<(), PresaleError> {
        if caller != self.cfg.beneficiary {
            warn!(%caller, op, "presale: rejected non-beneficiary call");
            return Err(PresaleError::Unauthorized);
        }
        Ok(())
    }

    fn state_at(&self, b: &Books, now: u64) -> SaleState {
        resolve(&StateInputs {
            now,
            starts_at: b.starts_at,
            ends_at: self.cfg.ends_at,
            funding_goal: self.cfg.funding_goal,
            wei_raised: b.wei_raised,
            tokens_sold: b.tokens_sold,
            maximum_sellable_tokens: self.cfg.maximum_sellable_tokens,
            wired: self.token.is_mint_agent(self.address),
            finalized: b.finalized,
            refunding: b.refunding,
        })
    }

    // ---------- Reads ----------

    pub fn state(&self) -> SaleState {
        let now = self.clock.now_unix();
        let b = self.books.read();
        self.state_at(&b, now)
    }

    /// Current start; moved to the call time by `start_early`.
    pub fn starts_at(&self) -> u64 {
        self.books.read().starts_at
    }

    /// Originally scheduled start, the anchor of the time bonus.
    pub fn scheduled_start(&self) -> u64 {
        self.cfg.starts_at
    }

    pub fn ends_at(&self) -> u64 {
        self.cfg.ends_at
    }

    pub fn invested_amount_of(&self, who: Address) -> Balance {
        self.books.read().investors.get(&who).map_or(0, |r| r.invested)
    }

    pub fn token_amount_of(&self, who: Address) -> Balance {
        self.books.read().investors.get(&who).map_or(0, |r| r.tokens)
    }

    pub fn investor(&self, who: Address) -> Option<InvestorRecord> {
        self.books.read().investors.get(&who).copied()
    }

    pub fn investor_count(&self) -> u64 {
        self.books.read().investor_count
    }

    pub fn tokens_sold(&self) -> Balance {
        self.books.read().tokens_sold
    }

    pub fn wei_raised(&self) -> Balance {
        self.books.read().wei_raised
    }

    pub fn wei_refunded(&self) -> Balance {
        self.books.read().wei_refunded
    }

    pub fn is_halted(&self) -> bool {
        self.books.read().halted
    }

    pub fn is_oracle(&self, who: Address) -> bool {
        who == self.cfg.beneficiary || self.books.read().oracles.contains(&who)
    }

    pub fn snapshot(&self) -> PresaleSnapshot {
        let now = self.clock.now_unix();
        let b = self.books.read();
        PresaleSnapshot {
            state: self.state_at(&b, now),
            starts_at: b.starts_at,
            ends_at: self.cfg.ends_at,
            wei_raised: b.wei_raised,
            wei_refunded: b.wei_refunded,
            tokens_sold: b.tokens_sold,
            investor_count: b.investor_count,
            halted: b.halted,
            finalized: b.finalized,
        }
    }

    // ---------- Purchases ----------

    /// Native-currency purchase of `value` smallest units by `investor`.
    /// Returns the number of token units minted.
    pub fn buy(&self, investor: Address, value: Balance) -> Result<Balance, PresaleError> {
        let _ex = self.exec.lock();
        self.invest_locked(investor, value, Channel::Native)
    }

    /// Record a BTC contribution worth `value` native units, attested by an
    /// oracle. Mints tokens but adds nothing refundable or to `wei_raised`.
    pub fn invest_btc(&self, caller: Address, investor: Address, value: Balance) -> Result<Balance, PresaleError> {
        let _ex = self.exec.lock();
        if !self.is_oracle(caller) {
            warn!(%caller, "presale: btc contribution from non-oracle");
            return Err(PresaleError::Unauthorized);
        }
        self.invest_locked(investor, value, Channel::Btc)
    }

    /// Caller holds `exec`.
    fn invest_locked(&self, investor: Address, value: Balance, channel: Channel) -> Result<Balance, PresaleError> {
        let now = self.clock.now_unix();
        let mut b = self.books.write();

        match self.state_at(&b, now) {
            SaleState::Funding => {}
            SaleState::PreFunding => return Err(PresaleError::TooEarly),
            other => return Err(PresaleError::InvalidState(other)),
        }
        if b.halted {
            return Err(PresaleError::Halted);
        }
        if value == 0 {
            return Err(PresaleError::ZeroContribution);
        }

        let elapsed = now.saturating_sub(self.cfg.starts_at);
        let bonus_bps = self.cfg.time_bonus.bonus_bps(elapsed) + self.cfg.volume_bonus.bonus_bps(value, self.cfg.native_unit);
        let tokens = self.cfg.tokens_for(value, bonus_bps)?;
        if tokens == 0 {
            return Err(PresaleError::ZeroContribution);
        }

        let tokens_sold = safe_add(b.tokens_sold, tokens)?;
        if tokens_sold > self.cfg.maximum_sellable_tokens {
            return Err(PresaleError::GoalExceeded);
        }
        let prev = b.investors.get(&investor).copied();
        let mut rec = prev.unwrap_or_default();
        rec.tokens = safe_add(rec.tokens, tokens)?;
        let mut wei_raised = b.wei_raised;
        if channel == Channel::Native {
            rec.invested = safe_add(rec.invested, value)?;
            wei_raised = safe_add(wei_raised, value)?;
        }
        let investor_count = if prev.is_none() {
            b.investor_count.checked_add(1).ok_or(MathError::Overflow)?
        } else {
            b.investor_count
        };

        if channel == Channel::Native {
            self.vault.collect(investor, value)?;
        }
        if let Err(e) = self.token.mint(self.address, investor, tokens) {
            drop(b);
            if channel == Channel::Native {
                if let Err(ve) = self.vault.pay_out(investor, value) {
                    warn!(%investor, value, error = %ve, "presale: could not return contribution after failed mint");
                }
            }
            return Err(e.into());
        }

        b.tokens_sold = tokens_sold;
        b.wei_raised = wei_raised;
        b.investor_count = investor_count;
        b.investors.insert(investor, rec);
        drop(b);

        debug!(%investor, ?channel, value, tokens, bonus_bps, "presale: invested");
        self.emit(PresaleEvent::Invested { investor, channel, value, tokens, bonus_bps });
        Ok(tokens)
    }

    // ---------- Transitions ----------

    /// Open the sale now instead of at the scheduled start. The time bonus
    /// stays anchored at the scheduled start.
    pub fn start_early(&self, caller: Address) -> Result<(), PresaleError> {
        let _ex = self.exec.lock();
        self.require_beneficiary(caller, "start_early")?;
        let now = self.clock.now_unix();
        let mut b = self.books.write();
        match self.state_at(&b, now) {
            SaleState::PreFunding => {}
            SaleState::Preparing => return Err(PresaleError::InvalidState(SaleState::Preparing)),
            _ => return Err(PresaleError::AlreadyStarted),
        }
        b.starts_at = now;
        info!(at = now, scheduled = self.cfg.starts_at, "presale: started early");
        self.emit(PresaleEvent::StartedEarly { at: now });
        Ok(())
    }

    /// Close a successful sale: forward the raise to the beneficiary and open
    /// token transfers. Returns the forwarded amount.
    pub fn finalize(&self, caller: Address) -> Result<Balance, PresaleError> {
        let _ex = self.exec.lock();
        self.require_beneficiary(caller, "finalize")?;
        let now = self.clock.now_unix();

        let forwarded = {
            let mut b = self.books.write();
            if b.finalized {
                return Err(PresaleError::AlreadyFinalized);
            }
            let state = self.state_at(&b, now);
            if state != SaleState::Success {
                return Err(PresaleError::InvalidState(state));
            }
            if self.token.transfers_locked() && self.token.release_agent() != Some(self.address) {
                warn!(address = %self.address, "presale: engine is not the release agent");
                return Err(LedgerError::Unauthorized.into());
            }
            let forwarded = safe_sub(b.wei_raised, b.wei_refunded)?;
            b.finalized = true;
            forwarded
        };

        if forwarded > 0 {
            if let Err(e) = self.vault.pay_out(self.cfg.beneficiary, forwarded) {
                self.books.write().finalized = false;
                warn!(error = %e, "presale: finalize payout failed");
                return Err(e.into());
            }
        }
        if self.token.transfers_locked() {
            self.token.release_token_transfer(self.address)?;
        }

        info!(forwarded, "presale: finalized");
        self.emit(PresaleEvent::Finalized { forwarded });
        Ok(forwarded)
    }

    /// Return `investor`'s native contribution after a failed sale. The record
    /// is zeroed before the payout, so a claim made from inside the payout
    /// sees nothing to refund.
    pub fn refund(&self, investor: Address) -> Result<Balance, PresaleError> {
        let _ex = self.exec.lock();
        let now = self.clock.now_unix();

        let (amount, was_refunding) = {
            let mut b = self.books.write();
            let state = self.state_at(&b, now);
            if !matches!(state, SaleState::Failure | SaleState::Refunding) {
                return Err(PresaleError::InvalidState(state));
            }
            let amount = b.investors.get(&investor).map_or(0, |r| r.invested);
            if amount == 0 {
                return Err(PresaleError::NothingToRefund);
            }
            let wei_refunded = safe_add(b.wei_refunded, amount)?;
            let was_refunding = b.refunding;
            if let Some(r) = b.investors.get_mut(&investor) {
                r.invested = 0;
            }
            b.wei_refunded = wei_refunded;
            b.refunding = true;
            (amount, was_refunding)
        };

        if let Err(e) = self.vault.pay_out(investor, amount) {
            let mut b = self.books.write();
            if let Some(r) = b.investors.get_mut(&investor) {
                r.invested = amount;
            }
            b.wei_refunded = safe_sub(b.wei_refunded, amount)?;
            b.refunding = was_refunding || b.wei_refunded > 0;
            warn!(%investor, amount, error = %e, "presale: refund payout failed");
            return Err(e.into());
        }

        if !was_refunding {
            info!("presale: refunding opened");
        }
        debug!(%investor, amount, "presale: refunded");
        self.emit(PresaleEvent::Refunded { investor, amount });
        Ok(amount)
    }

    // ---------- Administration ----------

    /// Emergency stop for purchases. Refunds and finalization are unaffected.
    pub fn halt(&self, caller: Address) -> Result<(), PresaleError> {
        self.set_halted(caller, true)
    }

    pub fn unhalt(&self, caller: Address) -> Result<(), PresaleError> {
        self.set_halted(caller, false)
    }

    fn set_halted(&self, caller: Address, halted: bool) -> Result<(), PresaleError> {
        let _ex = self.exec.lock();
        self.require_beneficiary(caller, if halted { "halt" } else { "unhalt" })?;
        let mut b = self.books.write();
        if b.halted == halted {
            return Ok(());
        }
        b.halted = halted;
        info!(halted, "presale: halt switch changed");
        self.emit(PresaleEvent::Halted { halted });
        Ok(())
    }

    pub fn set_oracle(&self, caller: Address, oracle: Address, enabled: bool) -> Result<(), PresaleError> {
        let _ex = self.exec.lock();
        self.require_beneficiary(caller, "set_oracle")?;
        let mut b = self.books.write();
        if enabled {
            b.oracles.insert(oracle);
        } else {
            b.oracles.remove(&oracle);
        }
        info!(%oracle, enabled, "presale: oracle changed");
        self.emit(PresaleEvent::OracleChanged { oracle, enabled });
        Ok(())
    }
}

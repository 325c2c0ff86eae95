//! Positions and PnL state computed by the platform's position engine.

use crate::account::AccountId;
use crate::security::SecurityId;
use dashmap::DashMap;

/// Inventory and PnL for one (account, security) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub qty: f64,
    pub avg_px: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_bought_qty: f64,
    pub total_sold_qty: f64,
    pub total_outstanding_buy_qty: f64,
    pub total_outstanding_sell_qty: f64,
    pub broker_account_id: i64,
    pub tm: i64,
}

/// Aggregate PnL for one sub-account.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pnl {
    pub realized: f64,
    pub unrealized: f64,
}

/// Read-mostly position state. The position engine writes, sessions read.
pub struct PositionManager {
    /// Trading-session tag reported to clients at login.
    session: String,
    /// Beginning-of-day positions.
    bods: DashMap<(AccountId, SecurityId), Position>,
    /// Live per-(sub-account, security) positions.
    sub_positions: DashMap<(AccountId, SecurityId), Position>,
    /// Live per-(broker-account, security) positions.
    broker_positions: DashMap<(i64, SecurityId), Position>,
    /// Aggregate PnL per sub-account.
    pnls: DashMap<AccountId, Pnl>,
}

impl PositionManager {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            bods: DashMap::new(),
            sub_positions: DashMap::new(),
            broker_positions: DashMap::new(),
            pnls: DashMap::new(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn set_bod(&self, acc: AccountId, sec: SecurityId, pos: Position) {
        self.bods.insert((acc, sec), pos);
    }

    /// BOD positions sorted by key for deterministic streaming.
    pub fn bods(&self) -> Vec<((AccountId, SecurityId), Position)> {
        let mut out: Vec<_> = self.bods.iter().map(|e| (*e.key(), *e.value())).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    pub fn set_position(&self, acc: AccountId, sec: SecurityId, pos: Position) {
        self.sub_positions.insert((acc, sec), pos);
    }

    pub fn get(&self, acc: AccountId, sec: SecurityId) -> Position {
        self.sub_positions
            .get(&(acc, sec))
            .map(|p| *p)
            .unwrap_or_default()
    }

    /// Live (sub-account, security) positions sorted by key.
    pub fn sub_positions(&self) -> Vec<((AccountId, SecurityId), Position)> {
        let mut out: Vec<_> = self
            .sub_positions
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    pub fn set_broker_position(&self, broker: i64, sec: SecurityId, pos: Position) {
        self.broker_positions.insert((broker, sec), pos);
    }

    pub fn get_broker(&self, broker: i64, sec: SecurityId) -> Position {
        self.broker_positions
            .get(&(broker, sec))
            .map(|p| *p)
            .unwrap_or_default()
    }

    pub fn set_pnl(&self, acc: AccountId, pnl: Pnl) {
        self.pnls.insert(acc, pnl);
    }

    /// Aggregate PnL per sub-account, sorted by account id.
    pub fn pnls(&self) -> Vec<(AccountId, Pnl)> {
        let mut out: Vec<_> = self.pnls.iter().map(|e| (*e.key(), *e.value())).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }
}

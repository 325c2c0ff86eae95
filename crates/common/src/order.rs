//! Orders, confirmations, the global order book and exchange connectivity.

use crate::account::{SubAccount, User};
use crate::error::EngineError;
use crate::security::{OrderSide, OrderType, Security, TimeInForce};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// An accepted order intent, attributed to its user and accounts.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub sec: Arc<Security>,
    pub user: Arc<User>,
    pub sub_account: Arc<SubAccount>,
    pub broker_account_id: i64,
    pub algo_id: i64,
    /// Original order id for cancel/replace chains; 0 when none.
    pub orig_id: i64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub qty: f64,
    pub price: f64,
    pub stop_price: f64,
}

/// Execution report type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    UnconfirmedNew,
    PendingNew,
    PendingCancel,
    New,
    Canceled,
    Filled,
    PartiallyFilled,
    Rejected,
    CancelRejected,
    RiskRejected,
}

impl ExecType {
    /// Whether this report closes the order.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::RiskRejected
        )
    }
}

/// Fill transaction type; anything else drops the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransType {
    New,
    Cancel,
    Other,
}

/// Immutable execution report emitted by the order book.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub order: Arc<Order>,
    pub exec_type: ExecType,
    /// Microseconds since epoch.
    pub transaction_time: i64,
    pub seq: u64,
    /// Exchange-assigned order id, reported with `New`.
    pub order_id: String,
    pub text: String,
    pub last_qty: f64,
    pub last_px: f64,
    pub exec_id: String,
    pub trans_type: TransType,
}

impl Confirmation {
    /// A bare report carrying only the order and type; callers fill the
    /// type-specific fields.
    pub fn new(order: Arc<Order>, exec_type: ExecType, transaction_time: i64) -> Self {
        Self {
            order,
            exec_type,
            transaction_time,
            seq: 0,
            order_id: String::new(),
            text: String::new(),
            last_qty: 0.0,
            last_px: 0.0,
            exec_id: String::new(),
            trans_type: TransType::Other,
        }
    }
}

/// A concrete exchange connection.
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn connected(&self) -> bool;
    fn reconnect(&self);
    fn place(&self, order: &Arc<Order>) -> Result<(), EngineError>;
    fn cancel(&self, order: &Arc<Order>) -> Result<(), EngineError>;
}

/// Process-wide order registry and confirmation store.
///
/// Confirmations are appended with monotonically increasing sequence
/// numbers; `confirmations_since` serves the offline replay path.
pub struct GlobalOrderBook {
    orders: DashMap<i64, Arc<Order>>,
    live: DashMap<i64, ()>,
    confirmations: RwLock<Vec<Arc<Confirmation>>>,
    next_order_id: AtomicI64,
    next_seq: AtomicU64,
}

impl GlobalOrderBook {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            live: DashMap::new(),
            confirmations: RwLock::new(Vec::new()),
            next_order_id: AtomicI64::new(1),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn next_order_id(&self) -> i64 {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, order: Arc<Order>) {
        self.live.insert(order.id, ());
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: i64) -> Option<Arc<Order>> {
        self.orders.get(&id).map(|o| o.clone())
    }

    /// Orders not yet closed by a terminal confirmation.
    pub fn open_orders(&self) -> Vec<Arc<Order>> {
        let mut out: Vec<Arc<Order>> = self
            .live
            .iter()
            .filter_map(|e| self.orders.get(e.key()).map(|o| o.clone()))
            .collect();
        out.sort_by_key(|o| o.id);
        out
    }

    /// Record a confirmation, assigning its sequence number.
    pub fn record(&self, mut cm: Confirmation) -> Arc<Confirmation> {
        cm.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if cm.exec_type.is_terminal() {
            self.live.remove(&cm.order.id);
        }
        let cm = Arc::new(cm);
        self.confirmations
            .write()
            .expect("confirmation store poisoned")
            .push(cm.clone());
        cm
    }

    /// Confirmations with `seq` strictly greater than the given watermark.
    pub fn confirmations_since(&self, seq: u64) -> Vec<Arc<Confirmation>> {
        self.confirmations
            .read()
            .expect("confirmation store poisoned")
            .iter()
            .filter(|cm| cm.seq > seq)
            .cloned()
            .collect()
    }
}

impl Default for GlobalOrderBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes orders and cancels to exchange adapters, keyed by the security's
/// listing exchange, and registers them in the global order book.
pub struct ExchangeConnectivityManager {
    adapters: DashMap<String, Arc<dyn ExchangeAdapter>>,
    book: Arc<GlobalOrderBook>,
}

impl ExchangeConnectivityManager {
    pub fn new(book: Arc<GlobalOrderBook>) -> Self {
        Self {
            adapters: DashMap::new(),
            book,
        }
    }

    pub fn add_adapter(&self, adapter: Arc<dyn ExchangeAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get_adapter(&self, name: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.get(name).map(|a| a.clone())
    }

    /// Adapter list sorted by name for deterministic fan-out.
    pub fn adapters(&self) -> Vec<Arc<dyn ExchangeAdapter>> {
        let mut out: Vec<Arc<dyn ExchangeAdapter>> =
            self.adapters.iter().map(|e| e.clone()).collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Assign an id, register the order and hand it to the exchange.
    pub fn place(&self, mut order: Order) -> Result<Arc<Order>, EngineError> {
        let adapter = self
            .adapters
            .get(&order.sec.exchange)
            .map(|a| a.clone())
            .ok_or_else(|| EngineError::NoAdapter(order.sec.exchange.clone()))?;
        order.id = self.book.next_order_id();
        let order = Arc::new(order);
        self.book.insert(order.clone());
        adapter.place(&order)?;
        Ok(order)
    }

    pub fn cancel(&self, order: &Arc<Order>) -> Result<(), EngineError> {
        let adapter = self
            .adapters
            .get(&order.sec.exchange)
            .map(|a| a.clone())
            .ok_or_else(|| EngineError::NoAdapter(order.sec.exchange.clone()))?;
        adapter.cancel(order)
    }

    /// Cancel every open order; used by the shutdown countdown.
    pub fn cancel_all(&self) {
        for order in self.book.open_orders() {
            if let Err(e) = self.cancel(&order) {
                debug!("cancel_all: order {}: {}", order.id, e);
            }
        }
    }
}

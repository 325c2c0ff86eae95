//! Dependency-injected handles to the shared trading subsystems.

use crate::auth::TokenStore;
use common::{
    AccountManager, AlgoManager, ExchangeConnectivityManager, GlobalOrderBook, MarketDataManager,
    PositionManager, SecurityManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

/// Everything a session needs to do its job. One instance per process,
/// shared by all sessions; the gateway only reads the managers, never
/// mutates them.
pub struct Engines {
    pub securities: Arc<SecurityManager>,
    pub accounts: Arc<AccountManager>,
    pub market_data: Arc<MarketDataManager>,
    pub exchange: Arc<ExchangeConnectivityManager>,
    pub algos: Arc<AlgoManager>,
    pub positions: Arc<PositionManager>,
    pub order_book: Arc<GlobalOrderBook>,
    pub tokens: Arc<TokenStore>,
    /// Directory of editable algorithm source files.
    pub algo_dir: PathBuf,
    /// Directory of `pnl-<sub-account-id>` history files.
    pub store_dir: PathBuf,
    /// Process start, seconds since epoch; reported at login.
    pub start_time: i64,
    /// Raised by the admin shutdown verb to stop the server loop.
    pub shutdown: Arc<Notify>,
}

//! Shared domain model of the trading platform.
//!
//! This crate holds the reference data, market data, position and order
//! state that the session gateway mediates access to:
//!
//! - **Lock-free managers**: `DashMap`-backed stores for securities,
//!   accounts, market-data snapshots, positions and orders
//! - **Adapter traits**: the seams towards concrete market-data feeds,
//!   exchange connectivity and algo implementations
//! - **Typed parameter domain**: the tagged value sum handed to the algo
//!   engine
//!
//! The gateway never mutates reference data; it reads these managers from
//! its session tasks while feeds and engines update them concurrently.

pub mod account;
pub mod algo;
pub mod error;
pub mod market_data;
pub mod order;
pub mod position;
pub mod security;

pub use account::{AccountId, AccountManager, BrokerAccount, SubAccount, User, UserId};
pub use algo::{
    AlgoAdapter, AlgoEvent, AlgoManager, ParamDef, ParamMap, ParamScalar, ParamValue,
    SecurityTuple,
};
pub use error::EngineError;
pub use market_data::{Depth, FeedAdapter, MarketData, MarketDataManager, Trade};
pub use order::{
    Confirmation, ExchangeAdapter, ExchangeConnectivityManager, ExecType, GlobalOrderBook, Order,
    TransType,
};
pub use position::{Pnl, Position, PositionManager};
pub use security::{OrderSide, OrderType, Security, SecurityId, SecurityManager, TimeInForce};

//! Client-facing session gateway of the trading platform.
//!
//! Terminates persistent bidirectional sessions from traders and UIs,
//! authenticates them, and mediates all interaction with the shared
//! trading subsystems: order routing, algo execution, market-data
//! distribution, position/PnL tracking and reference data.
//!
//! ## Architecture
//!
//! ```text
//! WebSocket / HTTP
//!         ↓
//! Session (per-connection task: dispatcher + 1s publisher tick)
//!         ↓
//! SessionRegistry (DashMap-based, lock-free)
//!         ↑
//! Engines (securities, accounts, market data, positions, orders, algos)
//! ```
//!
//! ## Ordering
//!
//! - Inbound messages are handled in arrival order on the session's task
//! - Every outbound frame goes through the session's unbounded channel,
//!   drained by one writer task, so bytes leave in send order
//! - Confirmations and algo events from the engines enter through the
//!   registry, which filters by account ownership per session

pub mod auth;
pub mod codec;
pub mod differ;
pub mod engines;
pub mod error;
pub mod orders;
pub mod outbound;
pub mod params;
pub mod refdata;
pub mod registry;
pub mod session;
pub mod ws_server;

pub use auth::{LoginState, TokenStore};
pub use engines::Engines;
pub use error::{GatewayError, Result};
pub use registry::{SessionHandle, SessionId, SessionRegistry};
pub use session::Session;
pub use ws_server::{create_router, AppState};

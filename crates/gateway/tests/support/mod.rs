//! Shared test fixtures: in-memory engines with sample reference data,
//! mock adapters, and a harness that drives a session against a channel.

use axum::extract::ws::Message;
use common::{
    AccountManager, AlgoAdapter, AlgoManager, BrokerAccount, EngineError,
    ExchangeAdapter, ExchangeConnectivityManager, FeedAdapter, GlobalOrderBook, MarketData,
    MarketDataManager, Order, ParamDef, ParamScalar, ParamValue, PositionManager, Security,
    SecurityManager, SubAccount, User,
};
use gateway::auth::sha1_hex;
use gateway::{Engines, Session, SessionHandle, TokenStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

pub struct MockFeed {
    pub connected: AtomicBool,
    pub reconnects: AtomicUsize,
}

impl MockFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
        })
    }
}

impl FeedAdapter for MockFeed {
    fn name(&self) -> &str {
        "sim"
    }
    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
    fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct MockExchange {
    pub connected: AtomicBool,
    pub reconnects: AtomicUsize,
    pub placed: Mutex<Vec<Arc<Order>>>,
    pub cancels: AtomicUsize,
}

impl MockExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
            placed: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn placed_orders(&self) -> Vec<Arc<Order>> {
        self.placed.lock().unwrap().clone()
    }
}

impl ExchangeAdapter for MockExchange {
    fn name(&self) -> &str {
        "NYSE"
    }
    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
    fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }
    fn place(&self, order: &Arc<Order>) -> Result<(), EngineError> {
        self.placed.lock().unwrap().push(order.clone());
        Ok(())
    }
    fn cancel(&self, _order: &Arc<Order>) -> Result<(), EngineError> {
        self.cancels.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct MockAlgo {
    defs: Vec<ParamDef>,
}

impl MockAlgo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            defs: vec![ParamDef {
                name: "Interval".into(),
                default_value: ParamValue::Scalar(ParamScalar::Int(60)),
                required: true,
                min_value: 1.0,
                max_value: 3600.0,
                precision: 0,
            }],
        })
    }
}

impl AlgoAdapter for MockAlgo {
    fn name(&self) -> &str {
        "TWAP"
    }
    fn param_defs(&self) -> &[ParamDef] {
        &self.defs
    }
}

pub struct Fixture {
    pub engines: Arc<Engines>,
    pub exchange: Arc<MockExchange>,
    pub feed: Arc<MockFeed>,
}

/// Sample world: securities 42/43 on NYSE, users alice (desk1), admin
/// (desk1+desk2) and bob (desk2), broker account 7 routing desk1@NYSE.
pub fn fixture() -> Fixture {
    fixture_with_dirs(PathBuf::from("/nonexistent"), PathBuf::from("/nonexistent"))
}

pub fn fixture_with_dirs(algo_dir: PathBuf, store_dir: PathBuf) -> Fixture {
    let securities = Arc::new(SecurityManager::new());
    securities.insert(Security {
        id: 42,
        symbol: "MSFT".into(),
        local_symbol: "MSFT".into(),
        exchange: "NYSE".into(),
        sec_type: "stock".into(),
        lot_size: 100.0,
        multiplier: 1.0,
        close_price: 9.5,
        ..Default::default()
    });
    securities.insert(Security {
        id: 43,
        symbol: "AAPL".into(),
        exchange: "NYSE".into(),
        sec_type: "stock".into(),
        lot_size: 100.0,
        multiplier: 1.0,
        ..Default::default()
    });

    let accounts = Arc::new(AccountManager::new());
    accounts.add_sub_account(SubAccount { id: 10, name: "desk1".into() });
    accounts.add_sub_account(SubAccount { id: 11, name: "desk2".into() });
    accounts.add_broker_account(BrokerAccount { id: 7, name: "prime".into() });
    accounts.link_broker(10, "NYSE", 7);
    accounts.add_user(User {
        id: 1,
        name: "alice".into(),
        password: sha1_hex("pw"),
        sub_accounts: [10].into_iter().collect(),
        ..Default::default()
    });
    accounts.add_user(User {
        id: 2,
        name: "root".into(),
        password: sha1_hex("pw"),
        is_admin: true,
        sub_accounts: [10, 11].into_iter().collect(),
        ..Default::default()
    });
    accounts.add_user(User {
        id: 3,
        name: "bob".into(),
        password: sha1_hex("pw"),
        sub_accounts: [11].into_iter().collect(),
        ..Default::default()
    });

    let market_data = Arc::new(MarketDataManager::new());
    let mut md = MarketData::default();
    md.tm = 100;
    md.trade.open = 9.0;
    md.trade.close = 9.5;
    md.depth[0].bid_price = 9.4;
    md.depth[0].ask_price = 9.6;
    market_data.set(42, md);
    let feed = MockFeed::new();
    market_data.add_adapter(feed.clone());

    let order_book = Arc::new(GlobalOrderBook::new());
    let exchange_mgr = Arc::new(ExchangeConnectivityManager::new(order_book.clone()));
    let exchange = MockExchange::new();
    exchange_mgr.add_adapter(exchange.clone());

    let algos = Arc::new(AlgoManager::new());
    algos.add_adapter(MockAlgo::new());

    let positions = Arc::new(PositionManager::new("2026-08-02"));

    let engines = Arc::new(Engines {
        securities,
        accounts,
        market_data,
        exchange: exchange_mgr,
        algos,
        positions,
        order_book,
        tokens: Arc::new(TokenStore::new()),
        algo_dir,
        store_dir,
        start_time: 1_754_000_000,
        shutdown: Arc::new(Notify::new()),
    });

    Fixture { engines, exchange, feed }
}

/// Drives one session and collects the frames it writes.
pub struct Harness {
    pub session: Session,
    pub shared: Arc<SessionHandle>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Harness {
    pub fn new(engines: Arc<Engines>) -> Self {
        Self::build(engines, false)
    }

    pub fn new_stateless(engines: Arc<Engines>) -> Self {
        Self::build(engines, true)
    }

    fn build(engines: Arc<Engines>, stateless: bool) -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed) as u64;
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = SessionHandle::new(id, format!("127.0.0.1:{}", 9000 + id), tx);
        let session = Session::new(shared.clone(), engines, stateless);
        Self { session, shared, rx }
    }

    pub async fn send(&mut self, msg: &str) {
        self.session.handle_message(msg, None).await;
    }

    pub async fn send_with_token(&mut self, msg: &str, token: &str) {
        self.session.handle_message(msg, Some(token)).await;
    }

    /// Drain pending frames as raw strings.
    pub fn raw_frames(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            if let Message::Text(text) = msg {
                out.push(text.to_string());
            }
        }
        out
    }

    /// Drain pending frames, parsed. The heartbeat `"h"` payload comes
    /// through as a bare string value.
    pub fn frames(&mut self) -> Vec<Value> {
        self.raw_frames()
            .into_iter()
            .map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)))
            .collect()
    }

    /// Log in and return the minted session token.
    pub async fn login(&mut self, name: &str, password: &str) -> String {
        self.send(&format!(r#"["login","{}","{}"]"#, name, password))
            .await;
        let frames = self.frames();
        let reply = frames
            .iter()
            .find(|f| f[0] == "connection")
            .expect("no connection reply");
        assert_eq!(reply[1], "ok");
        reply[2]["sessionToken"].as_str().expect("no token").to_string()
    }
}

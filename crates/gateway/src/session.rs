//! The per-connection session engine.
//!
//! One `Session` per live connection, driven entirely from that
//! connection's task: inbound messages are handled in arrival order and
//! the periodic publisher tick runs between them, so per-session state is
//! never touched concurrently. Every outbound frame funnels through the
//! session handle's channel, which preserves send order regardless of how
//! many threads the runtime uses.
//!
//! Handler failures become error reply frames on the same session; no
//! failure on one message affects the next message or any other session.

use crate::auth::{self, LoginState};
use crate::codec;
use crate::differ;
use crate::engines::Engines;
use crate::error::{GatewayError, Result};
use crate::outbound;
use crate::registry::SessionHandle;
use chrono::Utc;
use common::{AccountId, MarketData, SecurityId, User};
use metrics::counter;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

/// One market-data subscription: the snapshot last sent on this session
/// plus the subscriber reference count.
pub(crate) struct Sub {
    pub last: MarketData,
    pub refs: u32,
}

/// Per-connection state machine.
pub struct Session {
    pub(crate) shared: Arc<SessionHandle>,
    pub(crate) engines: Arc<Engines>,
    pub(crate) stateless: bool,
    pub(crate) subs: HashMap<SecurityId, Sub>,
    ecs_seen: HashMap<String, bool>,
    mds_seen: HashMap<String, bool>,
    single_pnls: HashMap<(AccountId, SecurityId), (f64, f64)>,
    pnls: HashMap<AccountId, (f64, f64)>,
    sub_pnl: bool,
}

impl Session {
    pub fn new(shared: Arc<SessionHandle>, engines: Arc<Engines>, stateless: bool) -> Self {
        Self {
            shared,
            engines,
            stateless,
            subs: HashMap::new(),
            ecs_seen: HashMap::new(),
            mds_seen: HashMap::new(),
            single_pnls: HashMap::new(),
            pnls: HashMap::new(),
            sub_pnl: false,
        }
    }

    pub(crate) fn send(&self, frame: Value) {
        self.shared.send_raw(frame.to_string());
    }

    pub(crate) fn current_user(&self) -> Result<Arc<User>> {
        self.shared
            .user()
            .ok_or_else(|| GatewayError::reject("msg", "action", "you must login first"))
    }

    /// Entry point for one inbound message. `token` is the in-band session
    /// token on stateless transports.
    pub async fn handle_message(&mut self, msg: &str, token: Option<&str>) {
        counter!("gateway_messages_total").increment(1);
        if msg == "h" {
            self.shared.send_raw("h");
            return;
        }
        if let Err(e) = self.dispatch(msg, token).await {
            counter!("gateway_error_replies_total").increment(1);
            debug!("{}: {} | {}", self.shared.addr, e, msg);
            let frame = match &e {
                GatewayError::Json(_) => json!(["error", "json", msg, "invalid json string"]),
                GatewayError::BadValue(text) => {
                    json!(["error", "json", msg, format!("json error: {}", text)])
                }
                GatewayError::Reject { context, field, text } => {
                    json!(["error", context, field, text])
                }
            };
            self.send(frame);
        }
    }

    async fn dispatch(&mut self, msg: &str, token: Option<&str>) -> Result<()> {
        let arr = codec::parse_array(msg)?;
        let action = codec::get_str(&arr, 0)?.to_string();
        if action.is_empty() {
            return Err(GatewayError::reject("msg", "action", "empty action"));
        }
        // Authentication gate; stateless transports carry the token per
        // message.
        if action != "login" && action != "validate_user" && self.shared.user().is_none() {
            match token.and_then(|t| self.engines.tokens.resolve(t)) {
                Some(user) => self.shared.set_user(user),
                None => {
                    return Err(GatewayError::reject("msg", "action", "you must login first"))
                }
            }
        }
        match action.as_str() {
            "login" | "validate_user" => self.on_login(&action, &arr).await,
            "bod" => self.on_bod(),
            "reconnect" => self.on_reconnect(&arr),
            "securities" => self.on_securities(),
            "position" => self.on_position(&arr),
            "offline" => self.on_offline(&arr),
            "shutdown" => self.on_shutdown(&arr).await,
            "cancel" => self.on_cancel(&arr),
            "order" => self.on_order(&arr),
            "algo" => self.on_algo(&arr),
            "pnl" => self.on_pnl_history(&arr).await,
            "sub" => self.on_sub(&arr),
            "unsub" => self.on_unsub(&arr),
            "algoFile" => self.on_algo_file(&arr).await,
            "saveAlgoFile" => self.on_save_algo_file(&arr).await,
            "deleteAlgoFile" => self.on_delete_algo_file(&arr).await,
            other => {
                debug!("{}: unknown action: {}", self.shared.addr, other);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Login and reference data
    // ========================================================================

    async fn on_login(&mut self, action: &str, arr: &[Value]) -> Result<()> {
        let name = codec::get_str(arr, 1)?;
        let password = codec::get_str(arr, 2)?;
        let (user, state) = auth::check(&self.engines.accounts, name, password);
        if action == "validate_user" {
            let corr = codec::get_i64(arr, 3)?;
            let uid = match (&user, state) {
                (Some(u), LoginState::Ok) => u.id,
                _ => 0,
            };
            self.send(json!(["user_validation", uid, corr]));
            return Ok(());
        }
        let user = match (user, state) {
            (Some(user), LoginState::Ok) => user,
            _ => {
                self.send(json!(["connection", state.as_str()]));
                return Ok(());
            }
        };
        let token = Uuid::new_v4().to_string();
        self.engines.tokens.insert(token.clone(), user.clone());
        self.send(json!([
            "connection",
            "ok",
            {
                "session": self.engines.positions.session(),
                "userId": user.id,
                "startTime": self.engines.start_time,
                "sessionToken": token,
                "securitiesCheckSum": self.engines.securities.check_sum(),
            }
        ]));
        if self.shared.user().is_none() && !self.stateless {
            self.shared.set_user(user.clone());
            info!("{}: {} logged in", self.shared.addr, user.name);
            self.export_reference_data(&user).await;
        }
        Ok(())
    }

    // ========================================================================
    // Positions and PnL
    // ========================================================================

    fn on_bod(&self) -> Result<()> {
        let user = self.current_user()?;
        for ((acc, sec), pos) in self.engines.positions.bods() {
            if !user.is_admin && !user.owns(acc) {
                continue;
            }
            self.send(json!([
                "bod",
                acc,
                sec,
                pos.qty,
                pos.avg_px,
                pos.realized_pnl,
                pos.broker_account_id,
                pos.tm
            ]));
        }
        Ok(())
    }

    fn on_position(&self, arr: &[Value]) -> Result<()> {
        let sec_id = codec::get_i64(arr, 1)?;
        let sec = self.engines.securities.get(sec_id).ok_or_else(|| {
            GatewayError::reject(
                "position",
                "security id",
                format!("Invalid security id: {}", sec_id),
            )
        })?;
        let acc_name = codec::get_str(arr, 2)?;
        let acc = self
            .engines
            .accounts
            .get_sub_account_by_name(acc_name)
            .ok_or_else(|| {
                GatewayError::reject(
                    "position",
                    "account name",
                    format!("Invalid account name: {}", acc_name),
                )
            })?;
        let broker = if arr.len() > 3 {
            codec::get_bool(arr, 3)?
        } else {
            false
        };
        let pos = if broker {
            let broker_acc = self.engines.accounts.broker_for(&acc, &sec).ok_or_else(|| {
                GatewayError::reject(
                    "position",
                    "account name",
                    "Can not find broker for this account and security pair",
                )
            })?;
            self.engines.positions.get_broker(broker_acc.id, sec.id)
        } else {
            self.engines.positions.get(acc.id, sec.id)
        };
        self.send(json!([
            "position",
            {
                "qty": pos.qty,
                "avg_px": pos.avg_px,
                "unrealized_pnl": pos.unrealized_pnl,
                "realized_pnl": pos.realized_pnl,
                "total_bought_qty": pos.total_bought_qty,
                "total_sold_qty": pos.total_sold_qty,
                "total_outstanding_buy_qty": pos.total_outstanding_buy_qty,
                "total_outstanding_sell_qty": pos.total_outstanding_sell_qty,
            }
        ]));
        Ok(())
    }

    /// Replay on-disk PnL history since `max(now - 24h, since)`, then
    /// latch periodic PnL diffing on.
    async fn on_pnl_history(&mut self, arr: &[Value]) -> Result<()> {
        let user = self.current_user()?;
        let mut tm0 = 0i64;
        if arr.len() >= 2 {
            tm0 = codec::get_i64(arr, 1)?;
        }
        tm0 = tm0.max(Utc::now().timestamp() - 24 * 3600);
        for (acc, _) in self.engines.positions.pnls() {
            if !user.owns(acc) {
                continue;
            }
            let path = self.engines.store_dir.join(format!("pnl-{}", acc));
            let Ok(text) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let mut rows = Vec::new();
            for line in text.lines() {
                let mut it = line.split_whitespace();
                let (Some(tm), Some(a), Some(b)) = (it.next(), it.next(), it.next()) else {
                    continue;
                };
                let (Ok(tm), Ok(a), Ok(b)) =
                    (tm.parse::<i64>(), a.parse::<f64>(), b.parse::<f64>())
                else {
                    continue;
                };
                if tm <= tm0 {
                    continue;
                }
                rows.push(json!([tm, a, b]));
            }
            if !rows.is_empty() {
                self.send(json!(["Pnl", acc, rows]));
            }
        }
        self.sub_pnl = true;
        Ok(())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    fn on_sub(&mut self, arr: &[Value]) -> Result<()> {
        let mut frame = vec![json!("md")];
        for i in 1..arr.len() {
            let id = codec::get_i64(arr, i)?;
            // Unknown ids are a silent no-op; no entry is created.
            if self.engines.securities.get(id).is_none() {
                continue;
            }
            let md = self.engines.market_data.get(id);
            let sub = self
                .subs
                .entry(id)
                .or_insert_with(|| Sub { last: MarketData::default(), refs: 0 });
            differ::push_diff(&mut frame, id, &md, &sub.last);
            sub.last = md;
            sub.refs += 1;
        }
        if frame.len() > 1 {
            self.send(Value::Array(frame));
        }
        Ok(())
    }

    fn on_unsub(&mut self, arr: &[Value]) -> Result<()> {
        for i in 1..arr.len() {
            let id = codec::get_i64(arr, i)?;
            let Some(sub) = self.subs.get_mut(&id) else {
                continue;
            };
            sub.refs = sub.refs.saturating_sub(1);
            if sub.refs == 0 {
                self.subs.remove(&id);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Adapters, offline replay, shutdown
    // ========================================================================

    fn on_reconnect(&self, arr: &[Value]) -> Result<()> {
        let name = codec::get_str(arr, 1)?;
        if let Some(adapter) = self.engines.market_data.get_adapter(name) {
            adapter.reconnect();
            return Ok(());
        }
        if let Some(adapter) = self.engines.exchange.get_adapter(name) {
            adapter.reconnect();
        }
        Ok(())
    }

    fn on_offline(&self, arr: &[Value]) -> Result<()> {
        let user = self.current_user()?;
        if arr.len() > 2 {
            let seq_algo = codec::get_i64(arr, 2)?;
            debug!("{}: offline algos requested: {}", self.shared.addr, seq_algo);
            for ev in self
                .engines
                .algos
                .events_since(seq_algo.max(0) as u64, user.id)
            {
                self.shared.send_raw(outbound::encode_algo_event(&ev, true));
            }
            self.send(json!(["offline_algos", "complete"]));
        }
        let seq = codec::get_i64(arr, 1)?;
        debug!(
            "{}: offline confirmations requested: {}",
            self.shared.addr, seq
        );
        for cm in self.engines.order_book.confirmations_since(seq.max(0) as u64) {
            if !user.owns(cm.order.sub_account.id) {
                continue;
            }
            if let Some(frame) = outbound::encode_confirmation(&cm, true) {
                self.shared.send_raw(frame);
            }
        }
        self.send(json!(["offline_orders", "complete"]));
        self.send(json!(["offline", "complete"]));
        Ok(())
    }

    /// Admin-only. Stops the server and the algo engine, cancels open
    /// orders once per tick of the countdown, then kills the process.
    async fn on_shutdown(&self, arr: &[Value]) -> Result<()> {
        let user = self.current_user()?;
        if !user.is_admin {
            return Ok(());
        }
        let mut seconds = 3.0;
        let mut interval = 1.0;
        if arr.len() > 1 {
            let n = codec::get_num(arr, 1)?;
            if n > seconds {
                seconds = n;
            }
        }
        if arr.len() > 2 {
            let n = codec::get_num(arr, 2)?;
            if n > interval && n < seconds {
                interval = n;
            }
        }
        self.engines.shutdown.notify_waiters();
        self.engines.algos.stop_all();
        info!("Shutting down");
        while seconds > 0.0 {
            info!("{}", seconds);
            seconds -= interval;
            sleep(Duration::from_secs_f64(interval)).await;
            self.engines.exchange.cancel_all();
        }
        sleep(Duration::from_secs(1)).await;
        let _ = std::process::Command::new("kill")
            .args(["-9", &std::process::id().to_string()])
            .status();
        Ok(())
    }

    // ========================================================================
    // Algo file editor
    // ========================================================================

    async fn on_algo_file(&self, arr: &[Value]) -> Result<()> {
        let name = codec::get_str(arr, 1)?;
        let path = self.engines.algo_dir.join(name);
        let mut j = vec![json!("algoFile"), json!(name)];
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => j.push(json!(text)),
            Err(_) => {
                j.push(Value::Null);
                j.push(json!("Not found"));
            }
        }
        self.send(Value::Array(j));
        Ok(())
    }

    async fn on_save_algo_file(&self, arr: &[Value]) -> Result<()> {
        let name = codec::get_str(arr, 1)?;
        let text = codec::get_str(arr, 2)?;
        let path = self.engines.algo_dir.join(name);
        let mut j = vec![json!("saveAlgoFile"), json!(name)];
        if tokio::fs::write(&path, text).await.is_err() {
            j.push(json!("Can not write"));
        }
        self.send(Value::Array(j));
        Ok(())
    }

    async fn on_delete_algo_file(&self, arr: &[Value]) -> Result<()> {
        let name = codec::get_str(arr, 1)?;
        let path = self.engines.algo_dir.join(name);
        let mut j = vec![json!("deleteAlgoFile"), json!(name)];
        if let Err(e) = tokio::fs::remove_file(&path).await {
            j.push(json!(e.to_string()));
        }
        self.send(Value::Array(j));
        Ok(())
    }

    // ========================================================================
    // Periodic publisher
    // ========================================================================

    /// One publisher tick. Returns `false` once the session is closed so
    /// the caller stops the timer. Publishing starts at login.
    pub fn tick(&mut self) -> bool {
        if self.shared.is_closed() {
            return false;
        }
        let Some(user) = self.shared.user() else {
            return true;
        };
        self.publish_market_status();
        self.publish_market_data();
        self.publish_pnl(&user);
        true
    }

    /// Adapter connectivity fan-out, on change only.
    fn publish_market_status(&mut self) {
        for adapter in self.engines.exchange.adapters() {
            let name = adapter.name().to_string();
            let v = adapter.connected();
            if self.ecs_seen.get(&name) != Some(&v) {
                self.ecs_seen.insert(name.clone(), v);
                self.send(json!(["market", "exchange", name, v]));
            }
        }
        for adapter in self.engines.market_data.adapters() {
            let name = adapter.name().to_string();
            let v = adapter.connected();
            if self.mds_seen.get(&name) != Some(&v) {
                self.mds_seen.insert(name.clone(), v);
                self.send(json!(["market", "data", name, v]));
            }
        }
    }

    fn publish_market_data(&mut self) {
        let market_data = self.engines.market_data.clone();
        let mut frame = vec![json!("md")];
        for (id, sub) in self.subs.iter_mut() {
            let md = market_data.get(*id);
            differ::push_diff(&mut frame, *id, &md, &sub.last);
            sub.last = md;
        }
        if frame.len() > 1 {
            self.send(Value::Array(frame));
        }
    }

    fn publish_pnl(&mut self, user: &Arc<User>) {
        if !self.sub_pnl {
            return;
        }
        let positions = self.engines.positions.clone();
        for ((acc, sec), pos) in positions.sub_positions() {
            if !user.owns(acc) {
                continue;
            }
            let last = self.single_pnls.entry((acc, sec)).or_default();
            let realized_changed = pos.realized_pnl != last.0;
            if !realized_changed && pos.unrealized_pnl == last.1 {
                continue;
            }
            *last = (pos.realized_pnl, pos.unrealized_pnl);
            let mut frame = vec![json!("pnl"), json!(acc), json!(sec), json!(pos.unrealized_pnl)];
            if realized_changed {
                frame.push(json!(pos.realized_pnl));
            }
            self.send(Value::Array(frame));
        }
        let now = Utc::now().timestamp();
        for (acc, pnl) in positions.pnls() {
            if !user.owns(acc) {
                continue;
            }
            let last = self.pnls.entry(acc).or_default();
            if pnl.realized == last.0 && pnl.unrealized == last.1 {
                continue;
            }
            *last = (pnl.realized, pnl.unrealized);
            self.send(json!(["Pnl", acc, now, pnl.realized, pnl.unrealized]));
        }
    }
}

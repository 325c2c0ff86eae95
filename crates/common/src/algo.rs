//! Algo engine registry and the typed parameter domain.

use crate::account::{SubAccount, User, UserId};
use crate::error::EngineError;
use crate::security::{OrderSide, Security};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// "Trade this qty of this security on this account on this side via this
/// source." All of security, account, side and quantity are required and
/// validated when the tuple is parsed off the wire.
#[derive(Debug, Clone)]
pub struct SecurityTuple {
    pub src: String,
    pub sec: Arc<Security>,
    pub acc: Arc<SubAccount>,
    pub side: OrderSide,
    pub qty: f64,
}

/// A scalar parameter value, preserving the JSON numeric kind.
#[derive(Debug, Clone)]
pub enum ParamScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Security(SecurityTuple),
}

/// A parameter value: a scalar or a flat vector of scalars. Vectors never
/// nest.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Scalar(ParamScalar),
    Vector(Vec<ParamScalar>),
}

/// The immutable parameter map handed to the algo engine.
pub type ParamMap = HashMap<String, ParamValue>;

/// Definition of one algo parameter, published to clients in `algo_def`
/// frames.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub default_value: ParamValue,
    pub required: bool,
    pub min_value: f64,
    pub max_value: f64,
    pub precision: i32,
}

/// A registered algorithm implementation.
pub trait AlgoAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn param_defs(&self) -> &[ParamDef];
}

/// A running algo instance.
#[derive(Debug, Clone)]
pub struct AlgoInstance {
    pub id: i64,
    pub token: String,
    pub name: String,
    pub user_id: UserId,
}

/// An algorithm lifecycle event, persisted for offline replay.
#[derive(Debug, Clone)]
pub struct AlgoEvent {
    pub seq: u64,
    pub algo_id: i64,
    pub tm: i64,
    pub token: String,
    pub name: String,
    pub status: String,
    pub body: String,
    pub user_id: UserId,
}

/// Algo adapter registry plus the table of running instances and their
/// event store.
pub struct AlgoManager {
    adapters: DashMap<String, Arc<dyn AlgoAdapter>>,
    active: DashMap<i64, AlgoInstance>,
    by_token: DashMap<String, i64>,
    events: RwLock<Vec<Arc<AlgoEvent>>>,
    next_id: AtomicI64,
    next_seq: AtomicU64,
}

impl AlgoManager {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
            active: DashMap::new(),
            by_token: DashMap::new(),
            events: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn add_adapter(&self, adapter: Arc<dyn AlgoAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Adapter list sorted by name for deterministic streaming.
    pub fn adapters(&self) -> Vec<Arc<dyn AlgoAdapter>> {
        let mut out: Vec<Arc<dyn AlgoAdapter>> =
            self.adapters.iter().map(|e| e.clone()).collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Id of the running instance holding the given token.
    pub fn get_token(&self, token: &str) -> Option<i64> {
        self.by_token.get(token).map(|id| *id)
    }

    /// Start a new instance. `params` is absent for test runs, which carry
    /// the raw parameter text instead.
    pub fn spawn(
        &self,
        _params: Option<Arc<ParamMap>>,
        name: &str,
        user: &Arc<User>,
        _raw_params: String,
        token: &str,
    ) -> Result<i64, EngineError> {
        if !self.adapters.contains_key(name) {
            return Err(EngineError::UnknownAlgo(name.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let inst = AlgoInstance {
            id,
            token: token.to_string(),
            name: name.to_string(),
            user_id: user.id,
        };
        if !token.is_empty() {
            self.by_token.insert(token.to_string(), id);
        }
        self.active.insert(id, inst);
        Ok(id)
    }

    pub fn stop_by_id(&self, id: i64) -> Result<(), EngineError> {
        let (_, inst) = self
            .active
            .remove(&id)
            .ok_or_else(|| EngineError::UnknownAlgoInstance(id.to_string()))?;
        if !inst.token.is_empty() {
            self.by_token.remove(&inst.token);
        }
        Ok(())
    }

    pub fn stop_by_token(&self, token: &str) -> Result<(), EngineError> {
        let id = self
            .get_token(token)
            .ok_or_else(|| EngineError::UnknownAlgoInstance(token.to_string()))?;
        self.stop_by_id(id)
    }

    pub fn modify_by_id(&self, id: i64, _params: Arc<ParamMap>) -> Result<(), EngineError> {
        if !self.active.contains_key(&id) {
            return Err(EngineError::UnknownAlgoInstance(id.to_string()));
        }
        Ok(())
    }

    pub fn modify_by_token(&self, token: &str, params: Arc<ParamMap>) -> Result<(), EngineError> {
        let id = self
            .get_token(token)
            .ok_or_else(|| EngineError::UnknownAlgoInstance(token.to_string()))?;
        self.modify_by_id(id, params)
    }

    /// Stop everything; used by the shutdown verb.
    pub fn stop_all(&self) {
        self.active.clear();
        self.by_token.clear();
    }

    /// Record a lifecycle event, assigning its sequence number.
    pub fn record_event(&self, mut ev: AlgoEvent) -> Arc<AlgoEvent> {
        ev.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let ev = Arc::new(ev);
        self.events
            .write()
            .expect("algo event store poisoned")
            .push(ev.clone());
        ev
    }

    /// Events for the given user with `seq` strictly greater than the
    /// watermark.
    pub fn events_since(&self, seq: u64, user_id: UserId) -> Vec<Arc<AlgoEvent>> {
        self.events
            .read()
            .expect("algo event store poisoned")
            .iter()
            .filter(|ev| ev.seq > seq && ev.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for AlgoManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Twap;

    impl AlgoAdapter for Twap {
        fn name(&self) -> &str {
            "TWAP"
        }
        fn param_defs(&self) -> &[ParamDef] {
            &[]
        }
    }

    fn user() -> Arc<User> {
        Arc::new(User { id: 1, name: "alice".into(), ..Default::default() })
    }

    #[test]
    fn test_spawn_unknown_algo() {
        let m = AlgoManager::new();
        let err = m.spawn(None, "VWAP", &user(), String::new(), "tok").unwrap_err();
        assert!(matches!(err, EngineError::UnknownAlgo(_)));
    }

    #[test]
    fn test_spawn_registers_token() {
        let m = AlgoManager::new();
        m.add_adapter(Arc::new(Twap));
        let id = m.spawn(None, "TWAP", &user(), String::new(), "tok-1").unwrap();
        assert_eq!(m.get_token("tok-1"), Some(id));
        m.stop_by_token("tok-1").unwrap();
        assert_eq!(m.get_token("tok-1"), None);
    }

    #[test]
    fn test_events_filtered_by_user_and_seq() {
        let m = AlgoManager::new();
        for (uid, status) in [(1, "started"), (2, "started"), (1, "done")] {
            m.record_event(AlgoEvent {
                seq: 0,
                algo_id: 1,
                tm: 0,
                token: "t".into(),
                name: "TWAP".into(),
                status: status.into(),
                body: String::new(),
                user_id: uid,
            });
        }
        let mine = m.events_since(1, 1);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, "done");
    }
}

//! Session handles and the process-wide session registry.
//!
//! The registry owns the live sessions in a table keyed by id; external
//! engines push confirmations, algo events and test output through it.
//! Delivery checks ownership per session and every send goes through the
//! session's channel, so per-session write order is the order of the
//! `deliver_*` calls.

use crate::outbound;
use axum::extract::ws::Message;
use common::{AlgoEvent, Confirmation, User};
use dashmap::{DashMap, DashSet};
use metrics::counter;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::info;

pub type SessionId = u64;

/// The registry-visible half of a session: everything that may be touched
/// from outside the session's own task.
pub struct SessionHandle {
    pub id: SessionId,
    pub addr: String,
    tx: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
    user: RwLock<Option<Arc<User>>>,
    /// Tokens of test algo runs whose output routes back to this session.
    pub test_algo_tokens: DashSet<String>,
}

impl SessionHandle {
    pub fn new(id: SessionId, addr: String, tx: mpsc::UnboundedSender<Message>) -> Arc<Self> {
        Arc::new(Self {
            id,
            addr,
            tx,
            closed: AtomicBool::new(false),
            user: RwLock::new(None),
            test_algo_tokens: DashSet::new(),
        })
    }

    /// Queue one frame on this session's write path. A closed session
    /// swallows the frame.
    pub fn send_raw(&self, frame: impl Into<String>) -> bool {
        let frame: String = frame.into();
        if self.send_message(Message::Text(frame.into())) {
            counter!("gateway_frames_sent_total").increment(1);
            true
        } else {
            false
        }
    }

    /// Queue a raw websocket message (pong replies and the like).
    pub fn send_message(&self, msg: Message) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(msg).is_ok()
    }

    pub fn user(&self) -> Option<Arc<User>> {
        self.user.read().expect("session user lock poisoned").clone()
    }

    pub fn set_user(&self, user: Arc<User>) {
        *self.user.write().expect("session user lock poisoned") = Some(user);
    }

    /// Terminal: no outbound frame is emitted after this.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, handle: Arc<SessionHandle>) {
        info!("session {} registered ({})", handle.id, handle.addr);
        self.sessions.insert(handle.id, handle);
    }

    pub fn unregister(&self, id: SessionId) {
        if let Some((_, handle)) = self.sessions.remove(&id) {
            handle.close();
            info!("session {} unregistered ({})", id, handle.addr);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn authenticated_len(&self) -> usize {
        self.sessions.iter().filter(|e| e.user().is_some()).count()
    }

    /// Fan a confirmation out to every session whose user owns the order's
    /// sub-account.
    pub fn deliver_confirmation(&self, cm: &Arc<Confirmation>) {
        for entry in self.sessions.iter() {
            let session = entry.value();
            let Some(user) = session.user() else { continue };
            if !user.owns(cm.order.sub_account.id) {
                continue;
            }
            if let Some(frame) = outbound::encode_confirmation(cm, false) {
                session.send_raw(frame);
                counter!("gateway_confirmations_routed_total").increment(1);
            }
        }
    }

    /// Fan an algo event out to the sessions of its owning user.
    pub fn deliver_algo_event(&self, ev: &Arc<AlgoEvent>) {
        for entry in self.sessions.iter() {
            let session = entry.value();
            let Some(user) = session.user() else { continue };
            if user.id != ev.user_id {
                continue;
            }
            session.send_raw(outbound::encode_algo_event(ev, false));
        }
    }

    /// Route test-run output to the sessions holding the token.
    pub fn send_test_msg(&self, token: &str, msg: &str, stopped: bool) {
        for entry in self.sessions.iter() {
            let session = entry.value();
            if !session.test_algo_tokens.contains(token) {
                continue;
            }
            session.send_raw(json!(["test_msg", msg]).to_string());
            if stopped {
                session.send_raw(json!(["test_done", token]).to_string());
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

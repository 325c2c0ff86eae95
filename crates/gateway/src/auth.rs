//! Credential verification and the process-wide session token store.

use common::{AccountManager, User};
use dashmap::DashMap;
use sha1::{Digest, Sha1};
use std::sync::Arc;

/// Lowercase hex SHA-1 digest, the stored password form.
pub fn sha1_hex(s: &str) -> String {
    format!("{:x}", Sha1::digest(s.as_bytes()))
}

/// Login verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    UnknownUser,
    WrongPassword,
    Disabled,
    Ok,
}

impl LoginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownUser => "unknown user",
            Self::WrongPassword => "wrong password",
            Self::Disabled => "disabled",
            Self::Ok => "ok",
        }
    }
}

/// Verify a (name, plaintext password) pair against the account master.
pub fn check(accounts: &AccountManager, name: &str, password: &str) -> (Option<Arc<User>>, LoginState) {
    let Some(user) = accounts.get_user(name) else {
        return (None, LoginState::UnknownUser);
    };
    if sha1_hex(password) != user.password {
        return (Some(user), LoginState::WrongPassword);
    }
    if user.is_disabled {
        return (Some(user), LoginState::Disabled);
    }
    (Some(user), LoginState::Ok)
}

/// Process-wide token table: session token -> user.
///
/// Insert-only by design: entries live for the remaining process lifetime,
/// so stateless clients can keep reusing a token after their originating
/// connection is gone. Concurrent insert and read are both lock-free.
pub struct TokenStore {
    tokens: DashMap<String, Arc<User>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    pub fn insert(&self, token: String, user: Arc<User>) {
        self.tokens.insert(token, user);
    }

    pub fn resolve(&self, token: &str) -> Option<Arc<User>> {
        self.tokens.get(token).map(|u| u.clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> AccountManager {
        let m = AccountManager::new();
        m.add_user(User {
            id: 1,
            name: "alice".into(),
            password: sha1_hex("pw"),
            ..Default::default()
        });
        m.add_user(User {
            id: 2,
            name: "mallory".into(),
            password: sha1_hex("pw"),
            is_disabled: true,
            ..Default::default()
        });
        m
    }

    #[test]
    fn test_sha1_empty_string_vector() {
        assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_check_outcomes() {
        let m = accounts();
        assert_eq!(check(&m, "bob", "pw").1, LoginState::UnknownUser);
        assert_eq!(check(&m, "alice", "bad").1, LoginState::WrongPassword);
        assert_eq!(check(&m, "mallory", "pw").1, LoginState::Disabled);
        let (user, state) = check(&m, "alice", "pw");
        assert_eq!(state, LoginState::Ok);
        assert_eq!(user.unwrap().id, 1);
    }

    #[test]
    fn test_token_store_resolve() {
        let m = accounts();
        let user = m.get_user("alice").unwrap();
        let store = TokenStore::new();
        store.insert("tok".into(), user);
        assert_eq!(store.resolve("tok").unwrap().name, "alice");
        assert!(store.resolve("other").is_none());
    }
}

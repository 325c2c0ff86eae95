//! Users, sub-accounts and broker accounts.

use crate::security::Security;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

pub type UserId = i64;
pub type AccountId = i64;

/// An authenticated principal. `password` holds the lowercase SHA-1 hex
/// digest, never the plaintext.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub password: String,
    pub is_admin: bool,
    pub is_disabled: bool,
    pub sub_accounts: HashSet<AccountId>,
}

impl User {
    /// Whether this user may act on the given sub-account.
    pub fn owns(&self, acc: AccountId) -> bool {
        self.sub_accounts.contains(&acc)
    }
}

/// A tradable account owned by one or more users.
#[derive(Debug, Clone, Default)]
pub struct SubAccount {
    pub id: AccountId,
    pub name: String,
}

/// A physical account at an executing broker.
#[derive(Debug, Clone, Default)]
pub struct BrokerAccount {
    pub id: i64,
    pub name: String,
}

/// Lock-free account master: users by name, sub-accounts by id and name,
/// broker accounts, and the (sub-account, exchange) routing table.
pub struct AccountManager {
    users: DashMap<String, Arc<User>>,
    sub_accounts: DashMap<AccountId, Arc<SubAccount>>,
    sub_accounts_by_name: DashMap<String, Arc<SubAccount>>,
    broker_accounts: DashMap<i64, Arc<BrokerAccount>>,
    /// (sub-account id, exchange name) -> broker account id.
    brokers: DashMap<(AccountId, String), i64>,
}

impl AccountManager {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            sub_accounts: DashMap::new(),
            sub_accounts_by_name: DashMap::new(),
            broker_accounts: DashMap::new(),
            brokers: DashMap::new(),
        }
    }

    pub fn add_user(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.users.insert(user.name.clone(), user.clone());
        user
    }

    pub fn get_user(&self, name: &str) -> Option<Arc<User>> {
        self.users.get(name).map(|u| u.clone())
    }

    /// All users, sorted by id for deterministic streaming.
    pub fn users(&self) -> Vec<Arc<User>> {
        let mut out: Vec<Arc<User>> = self.users.iter().map(|e| e.clone()).collect();
        out.sort_by_key(|u| u.id);
        out
    }

    pub fn add_sub_account(&self, acc: SubAccount) -> Arc<SubAccount> {
        let acc = Arc::new(acc);
        self.sub_accounts.insert(acc.id, acc.clone());
        self.sub_accounts_by_name.insert(acc.name.clone(), acc.clone());
        acc
    }

    pub fn get_sub_account(&self, id: AccountId) -> Option<Arc<SubAccount>> {
        self.sub_accounts.get(&id).map(|a| a.clone())
    }

    pub fn get_sub_account_by_name(&self, name: &str) -> Option<Arc<SubAccount>> {
        self.sub_accounts_by_name.get(name).map(|a| a.clone())
    }

    pub fn add_broker_account(&self, acc: BrokerAccount) -> Arc<BrokerAccount> {
        let acc = Arc::new(acc);
        self.broker_accounts.insert(acc.id, acc.clone());
        acc
    }

    /// All broker accounts, sorted by id.
    pub fn broker_accounts(&self) -> Vec<Arc<BrokerAccount>> {
        let mut out: Vec<Arc<BrokerAccount>> =
            self.broker_accounts.iter().map(|e| e.clone()).collect();
        out.sort_by_key(|a| a.id);
        out
    }

    /// Route (sub-account, exchange) to a broker account.
    pub fn link_broker(&self, acc: AccountId, exchange: &str, broker: i64) {
        self.brokers.insert((acc, exchange.to_string()), broker);
    }

    /// Resolve the broker account used when the given sub-account trades
    /// the given security.
    pub fn broker_for(&self, acc: &SubAccount, sec: &Security) -> Option<Arc<BrokerAccount>> {
        let id = *self.brokers.get(&(acc.id, sec.exchange.clone()))?;
        self.broker_accounts.get(&id).map(|a| a.clone())
    }
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_ownership() {
        let user = User {
            id: 1,
            name: "alice".into(),
            sub_accounts: [10, 11].into_iter().collect(),
            ..Default::default()
        };
        assert!(user.owns(10));
        assert!(!user.owns(12));
    }

    #[test]
    fn test_sub_account_lookup_by_id_and_name() {
        let m = AccountManager::new();
        m.add_sub_account(SubAccount { id: 10, name: "desk1".into() });
        assert_eq!(m.get_sub_account(10).unwrap().name, "desk1");
        assert_eq!(m.get_sub_account_by_name("desk1").unwrap().id, 10);
        assert!(m.get_sub_account_by_name("desk2").is_none());
    }

    #[test]
    fn test_broker_routing() {
        let m = AccountManager::new();
        m.add_sub_account(SubAccount { id: 10, name: "desk1".into() });
        m.add_broker_account(BrokerAccount { id: 7, name: "prime".into() });
        m.link_broker(10, "NYSE", 7);

        let acc = m.get_sub_account(10).unwrap();
        let nyse = Security { exchange: "NYSE".into(), ..Default::default() };
        let tse = Security { exchange: "TSE".into(), ..Default::default() };
        assert_eq!(m.broker_for(&acc, &nyse).unwrap().id, 7);
        assert!(m.broker_for(&acc, &tse).is_none());
    }
}

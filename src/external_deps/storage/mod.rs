//! Backing-store collaborator for the set of monitored accounts.
//!
//! Durable storage lives outside the core; the trait carries exactly the
//! operations the scheduler consumes. `MemoryStore` is the in-process
//! reference implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One monitored account as the store records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredAccount {
    pub chat_id: i64,
}

/// Store operations the scheduler depends on.
pub trait MonitorStore: Send + Sync {
    fn is_monitoring(&self, username: &str) -> bool;
    fn remove_account(&self, username: &str);
    fn clear_all(&self);
    fn all_accounts(&self) -> HashMap<String, MonitoredAccount>;
}

/// In-memory store keyed by account name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, MonitoredAccount>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, username: impl Into<String>, chat_id: i64) {
        if let Ok(mut guard) = self.accounts.write() {
            guard.insert(username.into(), MonitoredAccount { chat_id });
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MonitorStore for MemoryStore {
    fn is_monitoring(&self, username: &str) -> bool {
        self.accounts
            .read()
            .map(|map| map.contains_key(username))
            .unwrap_or(false)
    }

    fn remove_account(&self, username: &str) {
        if let Ok(mut guard) = self.accounts.write() {
            guard.remove(username);
        }
    }

    fn clear_all(&self) {
        if let Ok(mut guard) = self.accounts.write() {
            guard.clear();
        }
    }

    fn all_accounts(&self) -> HashMap<String, MonitoredAccount> {
        self.accounts
            .read()
            .map(|map| map.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_and_removes_accounts() {
        let store = MemoryStore::new();
        store.insert("alpha", 10);
        store.insert("beta", 20);
        assert!(store.is_monitoring("alpha"));
        assert_eq!(store.all_accounts().len(), 2);

        store.remove_account("alpha");
        assert!(!store.is_monitoring("alpha"));
        assert!(store.is_monitoring("beta"));

        store.clear_all();
        assert!(store.is_empty());
    }
}

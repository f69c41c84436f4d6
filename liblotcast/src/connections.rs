//! Platform connection lookup
//!
//! The orchestrator resolves credentials through [`ConnectionStore`]
//! so publishing logic does not care whether connections live in
//! SQLite or in memory. The database is the production store; the
//! in-memory store backs tests and one-off tooling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::Database;
use crate::error::Result;
use crate::types::{PlatformConnection, PlatformId};

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Look up one account's connection for one platform
    async fn connection(
        &self,
        account_id: &str,
        platform: PlatformId,
    ) -> Result<Option<PlatformConnection>>;
}

#[async_trait]
impl ConnectionStore for Database {
    async fn connection(
        &self,
        account_id: &str,
        platform: PlatformId,
    ) -> Result<Option<PlatformConnection>> {
        self.get_connection(account_id, platform).await
    }
}

/// In-memory connection store
#[derive(Default)]
pub struct MemoryConnectionStore {
    connections: Mutex<HashMap<(String, PlatformId), PlatformConnection>>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection: PlatformConnection) {
        let mut connections = self.connections.lock().expect("connection map poisoned");
        connections.insert(
            (connection.account_id.clone(), connection.platform),
            connection,
        );
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn connection(
        &self,
        account_id: &str,
        platform: PlatformId,
    ) -> Result<Option<PlatformConnection>> {
        let connections = self.connections.lock().expect("connection map poisoned");
        Ok(connections
            .get(&(account_id.to_string(), platform))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_memory_store_lookup() {
        let store = MemoryConnectionStore::new();
        store.insert(PlatformConnection {
            id: "conn-1".to_string(),
            account_id: "acct-1".to_string(),
            platform: PlatformId::Twitter,
            platform_user_id: "tw-1".to_string(),
            platform_username: None,
            access_token: SecretString::from("token"),
            refresh_token: None,
            token_expires_at: None,
            active: true,
        });

        let found = store
            .connection("acct-1", PlatformId::Twitter)
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = store
            .connection("acct-1", PlatformId::Facebook)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}

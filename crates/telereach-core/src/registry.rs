//! Live-connection registry.
//!
//! An explicit, caller-owned map of authorized connections, one per
//! account. The orchestrator constructs a single registry and passes it
//! down by handle; nothing in the core reaches into process globals.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    auth::{Authenticator, AuthorizedConnection},
    domain::AccountId,
    Result,
};

#[derive(Default)]
pub struct AccountRegistry {
    connections: Mutex<HashMap<AccountId, Arc<AuthorizedConnection>>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authorized connection, replacing any previous one
    /// for the same account.
    pub async fn insert(&self, conn: AuthorizedConnection) -> Arc<AuthorizedConnection> {
        let conn = Arc::new(conn);
        self.connections
            .lock()
            .await
            .insert(conn.account().id.clone(), conn.clone());
        conn
    }

    pub async fn get(&self, account: &AccountId) -> Option<Arc<AuthorizedConnection>> {
        self.connections.lock().await.get(account).cloned()
    }

    /// Accounts with a registered connection.
    pub async fn active(&self) -> Vec<AccountId> {
        self.connections.lock().await.keys().cloned().collect()
    }

    /// Disconnect and deregister one account.
    pub async fn close(&self, account: &AccountId) {
        let removed = self.connections.lock().await.remove(account);
        if let Some(conn) = removed {
            conn.disconnect().await;
            info!(account = %account, "disconnected");
        }
    }

    /// Disconnect and deregister every account.
    pub async fn close_all(&self) {
        let drained: Vec<_> = {
            let mut connections = self.connections.lock().await;
            connections.drain().collect()
        };
        for (account, conn) in drained {
            conn.disconnect().await;
            info!(account = %account, "disconnected");
        }
    }

    /// Whether the account's connection is still connected and authorized.
    pub async fn is_healthy(&self, account: &AccountId) -> bool {
        match self.get(account).await {
            Some(conn) => conn.is_healthy().await,
            None => false,
        }
    }

    /// Close `current` and bring up `next` from its stored session.
    pub async fn rotate(
        &self,
        auth: &Authenticator,
        current: &AccountId,
        next: &AccountId,
    ) -> Result<Arc<AuthorizedConnection>> {
        self.close(current).await;
        let conn = auth.authenticate(next, None, None, None).await?;
        Ok(self.insert(conn).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sessions::SessionStore,
        testing::{MockConnection, MockConnector},
    };

    async fn authorized(
        account: &AccountId,
        connector: &Arc<MockConnector>,
        store: &Arc<SessionStore>,
    ) -> (AuthorizedConnection, MockConnection) {
        store.save(account, "token", "+1555000001").unwrap();
        let mock = MockConnection::new();
        mock.set_authorized(true);
        connector.push_ok(mock.clone());

        let auth = Authenticator::new(connector.clone(), store.clone());
        let conn = auth.authenticate(account, None, None, None).await.unwrap();
        (conn, mock)
    }

    fn store() -> Arc<SessionStore> {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(
            dir.path().join("sessions.json"),
            &dir.path().join("session.key"),
        )
        .unwrap();
        std::mem::forget(dir);
        Arc::new(store)
    }

    #[tokio::test]
    async fn insert_get_and_active_listing() {
        let connector = Arc::new(MockConnector::default());
        let store = store();
        let registry = AccountRegistry::new();

        let a = AccountId::new("a");
        let (conn, _) = authorized(&a, &connector, &store).await;
        registry.insert(conn).await;

        assert!(registry.get(&a).await.is_some());
        assert_eq!(registry.active().await, vec![a]);
        assert!(registry.get(&AccountId::new("missing")).await.is_none());
    }

    #[tokio::test]
    async fn close_disconnects_and_deregisters() {
        let connector = Arc::new(MockConnector::default());
        let store = store();
        let registry = AccountRegistry::new();

        let a = AccountId::new("a");
        let (conn, mock) = authorized(&a, &connector, &store).await;
        registry.insert(conn).await;

        registry.close(&a).await;

        assert!(mock.disconnected());
        assert!(registry.get(&a).await.is_none());
        assert!(!registry.is_healthy(&a).await);
    }

    #[tokio::test]
    async fn close_all_tears_down_every_connection() {
        let connector = Arc::new(MockConnector::default());
        let store = store();
        let registry = AccountRegistry::new();

        let a = AccountId::new("a");
        let b = AccountId::new("b");
        let (conn_a, mock_a) = authorized(&a, &connector, &store).await;
        let (conn_b, mock_b) = authorized(&b, &connector, &store).await;
        registry.insert(conn_a).await;
        registry.insert(conn_b).await;

        registry.close_all().await;

        assert!(mock_a.disconnected());
        assert!(mock_b.disconnected());
        assert!(registry.active().await.is_empty());
    }

    #[tokio::test]
    async fn health_reflects_the_live_connection() {
        let connector = Arc::new(MockConnector::default());
        let store = store();
        let registry = AccountRegistry::new();

        let a = AccountId::new("a");
        let (conn, mock) = authorized(&a, &connector, &store).await;
        registry.insert(conn).await;

        assert!(registry.is_healthy(&a).await);
        mock.set_authorized(false);
        assert!(!registry.is_healthy(&a).await);
    }

    #[tokio::test]
    async fn rotate_closes_current_and_restores_next() {
        let connector = Arc::new(MockConnector::default());
        let store = store();
        let registry = AccountRegistry::new();
        let auth = Authenticator::new(connector.clone(), store.clone());

        let a = AccountId::new("a");
        let (conn_a, mock_a) = authorized(&a, &connector, &store).await;
        registry.insert(conn_a).await;

        // Next account has a stored session the platform accepts.
        let b = AccountId::new("b");
        store.save(&b, "token-b", "+1555000002").unwrap();
        let mock_b = MockConnection::new();
        mock_b.set_authorized(true);
        connector.push_ok(mock_b);

        let rotated = registry.rotate(&auth, &a, &b).await.unwrap();

        assert!(mock_a.disconnected());
        assert_eq!(rotated.account().id, b);
        assert_eq!(registry.active().await, vec![b]);
    }
}

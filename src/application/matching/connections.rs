//! Live connection bookkeeping.
//!
//! Maps transport connections to authenticated identities and back. One
//! identity may hold several connections (multiple tabs); delivery always
//! prefers the earliest-registered one that is still open.
//!
//! ```text
//! conn-a ─┐
//! conn-b ─┼─> user-1      user-1 -> [conn-a, conn-b]
//! conn-c ───> user-2      user-2 -> [conn-c]
//! ```

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use crate::domain::foundation::{ConnectionId, UserId};
use crate::domain::matching::MatchNotification;

/// Sending half of a connection's outbound notification channel.
pub type Outbound = mpsc::UnboundedSender<MatchNotification>;

#[derive(Default)]
struct Tables {
    by_connection: HashMap<ConnectionId, (UserId, Outbound)>,
    by_user: HashMap<UserId, Vec<ConnectionId>>,
}

/// Bidirectional connection <-> identity map.
///
/// Both directions live behind a single lock so they can never disagree.
#[derive(Default)]
pub struct ConnectionRegistry {
    tables: RwLock<Tables>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a connection to an identity.
    ///
    /// Re-registering an existing connection rebinds it to `user`.
    pub async fn register(&self, connection: ConnectionId, user: UserId, outbound: Outbound) {
        let mut tables = self.tables.write().await;

        if let Some((previous, _)) = tables.by_connection.remove(&connection) {
            detach(&mut tables.by_user, &previous, &connection);
        }

        tables
            .by_user
            .entry(user.clone())
            .or_default()
            .push(connection);
        tables.by_connection.insert(connection, (user, outbound));
    }

    /// Removes a connection, returning the identity it was bound to.
    pub async fn unregister(&self, connection: &ConnectionId) -> Option<UserId> {
        let mut tables = self.tables.write().await;
        let (user, _) = tables.by_connection.remove(connection)?;
        detach(&mut tables.by_user, &user, connection);
        Some(user)
    }

    pub async fn identity_of(&self, connection: &ConnectionId) -> Option<UserId> {
        let tables = self.tables.read().await;
        tables
            .by_connection
            .get(connection)
            .map(|(user, _)| user.clone())
    }

    /// Earliest-registered connection of `user` whose channel is still open.
    pub async fn connection_of(&self, user: &UserId) -> Option<ConnectionId> {
        let tables = self.tables.read().await;
        live_connection(&tables, user).map(|(id, _)| id)
    }

    /// Outbound channel of the connection `connection_of` would return.
    pub async fn outbound_for(&self, user: &UserId) -> Option<Outbound> {
        let tables = self.tables.read().await;
        live_connection(&tables, user).map(|(_, outbound)| outbound)
    }

    pub async fn is_online(&self, user: &UserId) -> bool {
        self.connection_of(user).await.is_some()
    }

    pub async fn connection_count(&self) -> usize {
        self.tables.read().await.by_connection.len()
    }
}

fn live_connection(tables: &Tables, user: &UserId) -> Option<(ConnectionId, Outbound)> {
    tables.by_user.get(user)?.iter().find_map(|id| {
        tables
            .by_connection
            .get(id)
            .filter(|(_, outbound)| !outbound.is_closed())
            .map(|(_, outbound)| (*id, outbound.clone()))
    })
}

fn detach(by_user: &mut HashMap<UserId, Vec<ConnectionId>>, user: &UserId, connection: &ConnectionId) {
    if let Some(connections) = by_user.get_mut(user) {
        connections.retain(|id| id != connection);
        if connections.is_empty() {
            by_user.remove(user);
        }
    }
}

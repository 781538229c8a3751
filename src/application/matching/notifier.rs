//! Delivery of match notifications to whoever is connected.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::matching::MatchNotification;

use super::ConnectionRegistry;

/// Sends notifications to an identity's live connection.
///
/// Delivery is best effort: an offline identity or a closed channel drops
/// the notification silently.
#[derive(Clone)]
pub struct Notifier {
    connections: Arc<ConnectionRegistry>,
}

impl Notifier {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self { connections }
    }

    /// Returns whether the notification was handed to a connection.
    pub async fn notify(&self, user: &UserId, notification: MatchNotification) -> bool {
        let event = notification.event_name();
        let Some(outbound) = self.connections.outbound_for(user).await else {
            tracing::trace!(user_id = %user, event, "Recipient offline, dropping notification");
            return false;
        };

        if outbound.send(notification).is_err() {
            tracing::trace!(user_id = %user, event, "Connection closed, dropping notification");
            return false;
        }
        true
    }

    /// Sends the same notification to every identity in `users`.
    pub async fn notify_all(&self, users: &[UserId], notification: MatchNotification) {
        for user in users {
            self.notify(user, notification.clone()).await;
        }
    }
}

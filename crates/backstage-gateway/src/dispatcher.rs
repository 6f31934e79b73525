use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use backstage_types::events::EventChange;

/// Fan-out point for row changes on the events table. Every write path that
/// updates an event publishes the before/after pair here; each subscribed
/// websocket feed filters it independently.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    changes_tx: broadcast::Sender<EventChange>,

    /// Live gateway sessions: conn_id -> user_id
    sessions: RwLock<HashMap<Uuid, Uuid>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                changes_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventChange> {
        self.inner.changes_tx.subscribe()
    }

    /// Publish an event update. Dropped silently when nobody is listening.
    pub fn publish(&self, change: EventChange) {
        let _ = self.inner.changes_tx.send(change);
    }

    /// Register a gateway session. Returns its connection id.
    pub async fn session_opened(&self, user_id: Uuid) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.sessions.write().await.insert(conn_id, user_id);
        conn_id
    }

    pub async fn session_closed(&self, conn_id: Uuid) {
        self.inner.sessions.write().await.remove(&conn_id);
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_tracked_per_connection() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let a = dispatcher.session_opened(user).await;
        let b = dispatcher.session_opened(user).await;
        assert_eq!(dispatcher.session_count().await, 2);
        dispatcher.session_closed(a).await;
        dispatcher.session_closed(a).await;
        assert_eq!(dispatcher.session_count().await, 1);
        dispatcher.session_closed(b).await;
        assert_eq!(dispatcher.session_count().await, 0);
    }
}

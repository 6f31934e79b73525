//! Turns the event change stream into per-session notices.
//!
//! Each subscribed feed runs as its own task that owns a broadcast receiver
//! and pushes [`Notification`]s into the session's outbound queue. Dropping
//! the [`Subscription`] aborts the task, so a session can never leak a feed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use backstage_db::Database;
use backstage_types::events::{EventChange, Feed, Notification};
use backstage_types::models::actor_label;

use crate::dispatcher::Dispatcher;
use crate::notify;

pub struct Subscription {
    feed: Feed,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn feed(&self) -> Feed {
        self.feed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a feed for `user_id`. The broadcast receiver is taken before this
/// returns, so every change published afterwards is seen by the feed.
pub fn spawn_feed(
    feed: Feed,
    user_id: Uuid,
    dispatcher: &Dispatcher,
    db: Arc<Database>,
    out: mpsc::UnboundedSender<Notification>,
) -> Subscription {
    let rx = dispatcher.subscribe();
    let handle = match feed {
        Feed::ClientDocuments => tokio::spawn(client_documents(user_id, rx, out)),
        Feed::AdminContracts => tokio::spawn(admin_contracts(user_id, rx, db, out)),
    };
    Subscription { feed, handle }
}

async fn next_change(rx: &mut broadcast::Receiver<EventChange>) -> Option<EventChange> {
    loop {
        match rx.recv().await {
            Ok(change) => return Some(change),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Change feed lagged by {} updates", n);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn client_documents(
    user_id: Uuid,
    mut rx: broadcast::Receiver<EventChange>,
    out: mpsc::UnboundedSender<Notification>,
) {
    while let Some(change) = next_change(&mut rx).await {
        if let Some(notice) = notify::client_notice(user_id, &change) {
            debug!("Document notice for {}: {:?}", user_id, notice);
            if out.send(notice).is_err() {
                break;
            }
        }
    }
}

async fn admin_contracts(
    user_id: Uuid,
    mut rx: broadcast::Receiver<EventChange>,
    db: Arc<Database>,
    out: mpsc::UnboundedSender<Notification>,
) {
    while let Some(change) = next_change(&mut rx).await {
        if !notify::signed_contract_added(&change.old, &change.new) {
            continue;
        }

        // Privilege is re-read for every notice; a demoted admin stops
        // receiving them without reconnecting.
        let owner_id = change.new.owner_id;
        let db = db.clone();
        let lookup = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<String>> {
            if !db.is_admin(user_id)? {
                return Ok(None);
            }
            let label = match db.get_profile(owner_id) {
                Ok(Some(p)) => actor_label(p.school.as_deref(), p.fraternity.as_deref()),
                Ok(None) => actor_label(None, None),
                Err(e) => {
                    warn!("Owner profile lookup for {} failed: {}", owner_id, e);
                    actor_label(None, None)
                }
            };
            Ok(Some(label))
        })
        .await;

        let actor = match lookup {
            Ok(Ok(Some(actor))) => actor,
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => {
                error!("Contract notice lookup failed: {}", e);
                continue;
            }
            Err(e) => {
                error!("spawn_blocking join error: {}", e);
                continue;
            }
        };

        if out.send(notify::contract_notice(&change, actor)).is_err() {
            break;
        }
    }
}

/// The feeds one session currently holds, at most one per [`Feed`].
#[derive(Default)]
pub struct FeedSet {
    active: HashMap<Feed, Subscription>,
}

impl FeedSet {
    /// Insert a subscription, replacing (and so cancelling) any existing one
    /// for the same feed.
    pub fn insert(&mut self, sub: Subscription) {
        self.active.insert(sub.feed(), sub);
    }

    /// Returns false when the feed was not active.
    pub fn remove(&mut self, feed: Feed) -> bool {
        self.active.remove(&feed).is_some()
    }

    pub fn contains(&self, feed: Feed) -> bool {
        self.active.contains_key(&feed)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{NaiveDate, Utc};

    use backstage_types::models::{DocumentRef, DocumentSet, DocumentSlot, Event, Role};

    use super::*;

    const QUIET: Duration = Duration::from_millis(100);

    fn setup() -> (Arc<Database>, Dispatcher, Event) {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        db.create_user(owner, "owner@example.com", "hash", Utc::now()).unwrap();
        db.update_profile(owner, Some("State"), Some("Sigma Chi")).unwrap();
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            owner_id: owner,
            chapter_id: None,
            name: Some("Homecoming".into()),
            date: NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
            artist_name: None,
            budget: 500.0,
            phone: "+15551234567".into(),
            documents: DocumentSet::default(),
            created_at: now,
            updated_at: now,
        };
        db.insert_event(&event).unwrap();
        (Arc::new(db), Dispatcher::new(), event)
    }

    fn change(old: &Event, slot: DocumentSlot) -> EventChange {
        let mut new = old.clone();
        *new.documents.slot_mut(slot) = Some(DocumentRef {
            url: format!("http://h/storage/event-documents/{}/{}-1.pdf", old.id, slot.as_str()),
            key: None,
        });
        EventChange {
            old: old.clone(),
            new,
        }
    }

    #[tokio::test]
    async fn client_feed_delivers_owner_notices() {
        let (db, dispatcher, event) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = spawn_feed(Feed::ClientDocuments, event.owner_id, &dispatcher, db, tx);

        dispatcher.publish(change(&event, DocumentSlot::Renders));
        let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice.message(), "Renders is now available for Homecoming");
    }

    #[tokio::test]
    async fn admin_feed_requires_admin_at_delivery_time() {
        let (db, dispatcher, event) = setup();
        let admin = Uuid::new_v4();
        db.create_user(admin, "admin@example.com", "hash", Utc::now()).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = spawn_feed(Feed::AdminContracts, admin, &dispatcher, db.clone(), tx);

        dispatcher.publish(change(&event, DocumentSlot::SignedContract));
        assert!(tokio::time::timeout(QUIET, rx.recv()).await.is_err());

        db.set_role(admin, Role::Admin).unwrap();
        dispatcher.publish(change(&event, DocumentSlot::SignedContract));
        let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            notice.message(),
            "State Sigma Chi uploaded a signed contract for Homecoming"
        );
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_delivery() {
        let (db, dispatcher, event) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut feeds = FeedSet::default();
        feeds.insert(spawn_feed(Feed::ClientDocuments, event.owner_id, &dispatcher, db, tx));
        assert!(feeds.contains(Feed::ClientDocuments));

        assert!(feeds.remove(Feed::ClientDocuments));
        assert!(!feeds.remove(Feed::ClientDocuments));
        dispatcher.publish(change(&event, DocumentSlot::Invoice));
        // the aborted task dropped its sender, so the queue closes empty
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(next.is_none());
    }
}

//! # murmur-broadcast
//!
//! Message fan-out to a dynamic set of subscribers.
//!
//! The [`Broadcaster`] serializes every structural change (subscribe,
//! unsubscribe) and every publish through one bounded action queue drained
//! by a single worker task. Because mutation and fan-out both happen inside
//! that worker, there is a single global order of actions and no external
//! code ever observes a partially-updated subscriber set.
//!
//! Each subscriber owns a bounded inbox. Publishing into a full inbox blocks
//! the worker until the subscriber drains — deliberate backpressure: a slow
//! consumer throttles the whole pipeline rather than losing messages. This
//! also means one stalled subscriber stalls delivery to all others; that is
//! a documented limitation of the design, not an accident.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use murmur_core::constants::{ACTION_QUEUE_CAPACITY, INBOX_CAPACITY};
use murmur_core::ids::SubscriberId;

/// One queued instruction for the broadcaster worker.
enum Action<T> {
    /// Attach a subscriber route.
    Add(Route<T>),
    /// Detach the route with the given id.
    Remove(SubscriberId),
    /// Fan a message out to every attached route.
    Publish(T),
    /// Serialized membership query; doubles as an ordering barrier.
    Count(oneshot::Sender<usize>),
    /// Stop the worker after the actions queued ahead of this one.
    Close,
}

/// The worker-side half of a subscription: id plus inbox sender.
struct Route<T> {
    id: SubscriberId,
    tx: mpsc::Sender<T>,
}

/// A subscriber's handle: its identifier and the receiving end of its inbox.
///
/// The entry is usable immediately after [`Broadcaster::subscribe`] returns —
/// the inbox exists independently of set membership, so messages published
/// after the `Add` is processed are never missed.
pub struct SubscriberEntry<T> {
    id: SubscriberId,
    inbox: mpsc::Receiver<T>,
}

impl<T> SubscriberEntry<T> {
    /// The identifier this entry was subscribed under.
    #[must_use]
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Receive the next pending message.
    ///
    /// Returns `None` once the route has been dropped by the worker (the
    /// subscriber was replaced or the broadcaster closed) and the inbox has
    /// been drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.inbox.recv().await
    }

    /// Non-blocking receive, for draining in tests and shutdown paths.
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        self.inbox.try_recv()
    }
}

/// Handle to the broadcast actor. Cheap to clone; all clones feed the same
/// serialized action queue.
pub struct Broadcaster<T> {
    actions: mpsc::Sender<Action<T>>,
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    /// Instance-owned started flag; a second `start` never spawns a second
    /// worker.
    started: AtomicBool,
    /// Receiver parked here between `new` and `start`.
    pending: Mutex<Option<mpsc::Receiver<Action<T>>>>,
}

impl<T> std::fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("started", &self.inner.started)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    /// Create a broadcaster with an empty subscriber set.
    ///
    /// Actions enqueued before [`start`](Self::start) sit in the bounded
    /// queue and are applied in order once the worker runs.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);
        Self {
            actions: tx,
            inner: Arc::new(Inner {
                started: AtomicBool::new(false),
                pending: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Launch the single worker that drains the action queue.
    ///
    /// Idempotent: a second call logs a warning and spawns nothing.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("broadcaster already running; ignoring start");
            return;
        }
        let rx = self.inner.pending.lock().take();
        match rx {
            Some(rx) => {
                let _ = tokio::spawn(worker(rx));
            }
            None => warn!("broadcaster receiver already taken; ignoring start"),
        }
    }

    /// Create a subscriber entry and enqueue its attachment.
    ///
    /// The entry is returned immediately; the `Add` is applied by the worker
    /// in queue order.
    pub async fn subscribe(&self, id: SubscriberId) -> SubscriberEntry<T> {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let route = Route { id: id.clone(), tx };
        if self.actions.send(Action::Add(route)).await.is_err() {
            warn!(id = %id, "broadcaster closed; subscription will never attach");
        }
        SubscriberEntry { id, inbox: rx }
    }

    /// Enqueue detachment of the subscriber with the given id.
    ///
    /// Matching is by identifier, not entry identity. An id with no matching
    /// route is a no-op that the worker logs as a warning.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.actions.send(Action::Remove(id)).await.is_err() {
            warn!("broadcaster closed; dropping unsubscribe");
        }
    }

    /// Enqueue a message for fan-out to every subscriber attached at the
    /// time the worker processes this publish.
    pub async fn publish(&self, message: T) {
        if self.actions.send(Action::Publish(message)).await.is_err() {
            warn!("broadcaster closed; dropping publish");
        }
    }

    /// Current subscriber count, answered by the worker in queue order.
    ///
    /// Because the query is serialized behind every previously enqueued
    /// action, it also serves as a completion barrier.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.actions.send(Action::Count(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Ask the worker to stop after draining the actions queued ahead.
    pub async fn close(&self) {
        if self.actions.send(Action::Close).await.is_err() {
            debug!("broadcaster already closed");
        }
    }
}

/// The single worker. Owns the subscriber set; applies one action at a time.
async fn worker<T: Clone + Send + 'static>(mut rx: mpsc::Receiver<Action<T>>) {
    let mut routes: Vec<Route<T>> = Vec::with_capacity(64);
    while let Some(action) = rx.recv().await {
        match action {
            Action::Add(route) => {
                debug!(id = %route.id, "adding subscriber");
                if let Some(stale) = routes.iter_mut().find(|r| r.id == route.id) {
                    warn!(id = %route.id, "duplicate subscriber id; replacing stale route");
                    *stale = route;
                } else {
                    routes.push(route);
                }
                info!(size = routes.len(), "added subscriber");
            }
            Action::Remove(id) => match routes.iter().position(|r| r.id == id) {
                Some(at) => {
                    drop(routes.remove(at));
                    info!(id = %id, size = routes.len(), "removed subscriber");
                }
                None => warn!(id = %id, "no subscriber matches remove"),
            },
            Action::Publish(message) => {
                for route in &routes {
                    // Bounded send: a full inbox parks the worker here until
                    // the subscriber drains. Backpressure, not loss.
                    if route.tx.send(message.clone()).await.is_err() {
                        counter!("broadcast_closed_inbox_total").increment(1);
                        debug!(id = %route.id, "inbox closed; subscriber is gone");
                    }
                }
                counter!("broadcast_publish_total").increment(1);
            }
            Action::Count(reply) => {
                let _ = reply.send(routes.len());
            }
            Action::Close => break,
        }
    }
    debug!("broadcaster worker exited");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn id(s: &str) -> SubscriberId {
        SubscriberId::from(s)
    }

    #[tokio::test]
    async fn subscriber_receives_published_message_once() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        let mut entry = bc.subscribe(id("s1")).await;
        bc.publish("hello".to_owned()).await;

        assert_eq!(entry.recv().await.as_deref(), Some("hello"));
        assert!(entry.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishes_are_delivered_in_order() {
        let bc = Broadcaster::<u32>::new();
        bc.start();
        let mut entry = bc.subscribe(id("s1")).await;
        for n in 0..5 {
            bc.publish(n).await;
        }
        for n in 0..5 {
            assert_eq!(entry.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn actions_enqueued_before_start_apply_in_order() {
        let bc = Broadcaster::<String>::new();
        let mut entry = bc.subscribe(id("early")).await;
        bc.publish("queued".to_owned()).await;
        bc.start();

        assert_eq!(entry.recv().await.as_deref(), Some("queued"));
        assert_eq!(bc.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn second_start_does_not_spawn_second_worker() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        bc.start();

        let mut entry = bc.subscribe(id("s1")).await;
        bc.publish("one".to_owned()).await;
        // With a duplicate worker the single queued publish could be consumed
        // twice; exactly one delivery proves one worker is draining.
        assert_eq!(entry.recv().await.as_deref(), Some("one"));
        assert_eq!(bc.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_excludes_entry_from_later_publishes() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        let mut gone = bc.subscribe(id("gone")).await;
        let mut kept = bc.subscribe(id("kept")).await;

        bc.unsubscribe(id("gone")).await;
        bc.publish("after".to_owned()).await;

        assert_eq!(kept.recv().await.as_deref(), Some("after"));
        // Route dropped by the worker: the inbox closes without a message.
        assert_eq!(gone.recv().await, None);
        assert_eq!(bc.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_is_a_no_op() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        let _entry = bc.subscribe(id("s1")).await;

        bc.unsubscribe(id("no_such")).await;

        assert_eq!(bc.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_subscribe_replaces_stale_route() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        let mut old = bc.subscribe(id("dup")).await;
        let mut new = bc.subscribe(id("dup")).await;

        bc.publish("only-new".to_owned()).await;

        assert_eq!(new.recv().await.as_deref(), Some("only-new"));
        assert_eq!(old.recv().await, None);
        assert_eq!(bc.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn close_stops_the_worker() {
        let bc = Broadcaster::<String>::new();
        bc.start();
        let mut entry = bc.subscribe(id("s1")).await;
        bc.close().await;

        // Worker gone: routes dropped, inbox closes.
        assert_eq!(entry.recv().await, None);
        assert_eq!(bc.subscriber_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_inbox_blocks_the_worker() {
        let bc = Broadcaster::<u32>::new();
        bc.start();
        let mut slow = bc.subscribe(id("slow")).await;

        // INBOX_CAPACITY messages fill the inbox; one more parks the worker
        // mid-publish.
        for n in 0..=INBOX_CAPACITY {
            bc.publish(u32::try_from(n).unwrap()).await;
        }

        // The serialized count query cannot be answered while the worker is
        // parked on the full inbox.
        let stalled = timeout(Duration::from_millis(50), bc.subscriber_count()).await;
        assert!(stalled.is_err(), "worker should be blocked on backpressure");

        // Draining one message unparks the worker; the query then resolves.
        assert_eq!(slow.recv().await, Some(0));
        let count = timeout(Duration::from_secs(5), bc.subscriber_count())
            .await
            .expect("worker should resume after drain");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn interleaved_mutations_converge_to_sequential_membership() {
        let bc = Broadcaster::<String>::new();
        bc.start();

        // Structural churn only: publishing into inboxes nobody drains would
        // (correctly) park the worker on backpressure.
        let mut tasks = Vec::new();
        for t in 0..8 {
            let bc = bc.clone();
            tasks.push(tokio::spawn(async move {
                let mut entries = Vec::new();
                for n in 0..10 {
                    entries.push(bc.subscribe(id(&format!("t{t}-s{n}"))).await);
                }
                for n in 0..5 {
                    bc.unsubscribe(id(&format!("t{t}-s{n}"))).await;
                }
                entries.split_off(5)
            }));
        }

        let mut survivors = Vec::new();
        for task in tasks {
            survivors.extend(task.await.expect("task panicked"));
        }

        // Whatever the interleaving, the membership converges to the
        // sequential result: 8 tasks x (10 subscribed - 5 removed).
        assert_eq!(bc.subscriber_count().await, 40);

        // Every surviving entry was attached before this publish was
        // enqueued, so each receives the sentinel exactly once.
        bc.publish("fin".to_owned()).await;
        for entry in &mut survivors {
            assert_eq!(
                entry.recv().await.as_deref(),
                Some("fin"),
                "entry {} missed the sentinel",
                entry.id()
            );
            assert!(entry.try_recv().is_err());
        }
    }
}

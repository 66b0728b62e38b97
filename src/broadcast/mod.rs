//! Real-time fan-out.
//!
//! Every subscriber owns a bounded queue. [Broadcaster::publish] never
//! waits: it serializes the record once and pushes it to each queue,
//! a full or closed queue unregisters its subscriber. A forwarding task
//! per subscriber ([Broadcaster::forward]) drains the queue into the
//! transport, each send bounded by the configured timeout.
//!
//! ```text
//! listener ──publish──┬──> queue #1 ──forward──> websocket #1
//!                     ├──> queue #2 ──forward──> websocket #2
//!                     └──> queue #3 ──forward──> websocket #3
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use log::{debug, error, warn};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    decoder::Telemetry,
    error::{SubscribeError, TransportSendError},
};

mod sink;

pub use sink::SubscriberSink;

/// Serialized record, shared by all queues
pub type Payload = Arc<str>;

static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Payload>,
}

impl Subscriber {
    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Receiving end of a registered subscriber
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Payload>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next record. None once the subscriber has been unregistered
    /// and its queue is drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }
}

#[derive(Debug)]
pub struct Broadcaster {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    queue_capacity: usize,
    max_subscribers: usize,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(queue_capacity: usize, max_subscribers: usize, send_timeout: Duration) -> Self {
        Self {
            send_timeout,
            max_subscribers,
            queue_capacity: queue_capacity.max(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a new subscriber. It only receives what is published
    /// from now on.
    pub fn subscribe(&self) -> Result<Subscription, SubscribeError> {
        let mut subscribers = self.subscribers.write();

        if subscribers.len() >= self.max_subscribers {
            return Err(SubscribeError::MaxSubscribers {
                max: self.max_subscribers,
            });
        }

        let (sender, rx) = mpsc::channel(self.queue_capacity);
        let id = SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);

        subscribers.push(Arc::new(Subscriber { id, sender }));
        debug!("subscriber #{} registered ({} total)", id, subscribers.len());

        Ok(Subscription { id, rx })
    }

    /// Unregisters a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);

        let removed = subscribers.len() < before;
        if removed {
            debug!("subscriber #{} removed ({} left)", id, subscribers.len());
        }
        removed
    }

    /// Number of registered subscribers
    pub fn count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Serializes a record for delivery
    pub fn encode(telemetry: &Telemetry) -> Option<Payload> {
        match serde_json::to_string(telemetry) {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                error!("{} serialization error: {}", telemetry.category(), e);
                None
            },
        }
    }

    /// Pushes a record to every subscriber. Returns the number of queues
    /// that accepted it.
    pub fn publish(&self, telemetry: &Telemetry) -> usize {
        match Self::encode(telemetry) {
            Some(payload) => self.publish_payload(payload),
            None => 0,
        }
    }

    fn publish_payload(&self, payload: Payload) -> usize {
        let subscribers = self.subscribers.read().clone();

        let mut delivered = 0;
        let mut dropped = Vec::new();

        for subscriber in subscribers.iter() {
            match subscriber.sender.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("subscriber #{} is lagging: dropped", subscriber.id);
                    dropped.push(subscriber.id);
                },
                Err(TrySendError::Closed(_)) => {
                    debug!("subscriber #{} disconnected", subscriber.id);
                    dropped.push(subscriber.id);
                },
            }
        }

        if !dropped.is_empty() {
            self.subscribers
                .write()
                .retain(|subscriber| !dropped.contains(&subscriber.id));
        }

        delivered
    }

    /// Unregisters subscribers whose receiving end is gone
    pub fn cleanup_disconnected(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.is_connected());
        before - subscribers.len()
    }

    /// Drains a [Subscription] into its transport until either side gives up.
    /// `snapshot` records are delivered first. The subscriber is always
    /// unregistered on return.
    pub async fn forward<S: SubscriberSink>(
        &self,
        mut subscription: Subscription,
        mut sink: S,
        snapshot: Vec<Payload>,
    ) -> Result<(), TransportSendError> {
        let id = subscription.id();

        let mut result = Ok(());

        for payload in snapshot {
            result = self.deliver(&mut sink, payload).await;
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() {
            while let Some(payload) = subscription.recv().await {
                result = self.deliver(&mut sink, payload).await;
                if result.is_err() {
                    break;
                }
            }
        }

        self.unsubscribe(id);

        if let Err(e) = &result {
            warn!("subscriber #{} dropped: {}", id, e);
        }

        result
    }

    async fn deliver<S: SubscriberSink>(
        &self,
        sink: &mut S,
        payload: Payload,
    ) -> Result<(), TransportSendError> {
        match tokio::time::timeout(self.send_timeout, sink.deliver(payload)).await {
            Ok(result) => result,
            Err(_) => Err(TransportSendError::Timeout),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        decoder::{Category, decode, test::pvt_datagram},
        record::Arrival,
    };
    use std::future::pending;
    use tokio::{sync::mpsc::error::TryRecvError, time::timeout};

    const SEND_TIMEOUT: Duration = Duration::from_millis(100);

    /// Transport that never completes a send
    struct Stalled;

    impl SubscriberSink for Stalled {
        async fn deliver(&mut self, _: Payload) -> Result<(), TransportSendError> {
            pending().await
        }
    }

    fn pvt(valid_sats: u32) -> Telemetry {
        decode(Category::Pvt, &pvt_datagram(valid_sats, 4), &Arrival::now()).unwrap()
    }

    fn valid_sats(payload: &Payload) -> u64 {
        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(json["type"], "pvt");
        json["valid_sats"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe() {
        let broadcaster = Broadcaster::new(8, 10, SEND_TIMEOUT);

        let a = broadcaster.subscribe().unwrap();
        let b = broadcaster.subscribe().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(broadcaster.count(), 2);

        assert!(broadcaster.unsubscribe(a.id()));
        assert!(!broadcaster.unsubscribe(a.id()));
        assert_eq!(broadcaster.count(), 1);
    }

    #[tokio::test]
    async fn subscriber_limit() {
        let broadcaster = Broadcaster::new(8, 2, SEND_TIMEOUT);

        let _a = broadcaster.subscribe().unwrap();
        let _b = broadcaster.subscribe().unwrap();

        assert!(matches!(
            broadcaster.subscribe(),
            Err(SubscribeError::MaxSubscribers { max: 2 })
        ));
    }

    #[tokio::test]
    async fn publish_reaches_everyone_in_order() {
        let broadcaster = Broadcaster::new(8, 10, SEND_TIMEOUT);

        let mut a = broadcaster.subscribe().unwrap();
        let mut b = broadcaster.subscribe().unwrap();

        for sats in 4..8 {
            assert_eq!(broadcaster.publish(&pvt(sats)), 2);
        }

        for subscription in [&mut a, &mut b] {
            for sats in 4..8 {
                let payload = subscription.recv().await.unwrap();
                assert_eq!(valid_sats(&payload), sats);
            }
        }
    }

    #[tokio::test]
    async fn no_replay_for_late_joiners() {
        let broadcaster = Broadcaster::new(8, 10, SEND_TIMEOUT);

        assert_eq!(broadcaster.publish(&pvt(5)), 0);

        let mut late = broadcaster.subscribe().unwrap();
        assert!(matches!(late.rx.try_recv(), Err(TryRecvError::Empty)));

        broadcaster.publish(&pvt(6));
        assert_eq!(valid_sats(&late.recv().await.unwrap()), 6);
    }

    #[tokio::test]
    async fn full_queue_drops_subscriber() {
        let broadcaster = Broadcaster::new(2, 10, SEND_TIMEOUT);

        let mut lagging = broadcaster.subscribe().unwrap();
        let mut healthy = broadcaster.subscribe().unwrap();

        assert_eq!(broadcaster.publish(&pvt(4)), 2);
        assert_eq!(healthy.recv().await.map(|p| valid_sats(&p)), Some(4));

        assert_eq!(broadcaster.publish(&pvt(5)), 2);
        assert_eq!(healthy.recv().await.map(|p| valid_sats(&p)), Some(5));

        // lagging queue is now full
        assert_eq!(broadcaster.publish(&pvt(6)), 1);
        assert_eq!(broadcaster.count(), 1);
        assert_eq!(healthy.recv().await.map(|p| valid_sats(&p)), Some(6));

        // what was queued is still delivered, then the queue closes
        assert_eq!(lagging.recv().await.map(|p| valid_sats(&p)), Some(4));
        assert_eq!(lagging.recv().await.map(|p| valid_sats(&p)), Some(5));
        assert!(lagging.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_subscriber_is_cleaned_up() {
        let broadcaster = Broadcaster::new(8, 10, SEND_TIMEOUT);

        let gone = broadcaster.subscribe().unwrap();
        let _kept = broadcaster.subscribe().unwrap();
        drop(gone);

        assert_eq!(broadcaster.cleanup_disconnected(), 1);
        assert_eq!(broadcaster.count(), 1);

        let gone = broadcaster.subscribe().unwrap();
        drop(gone);
        assert_eq!(broadcaster.publish(&pvt(4)), 1);
        assert_eq!(broadcaster.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_subscriber_does_not_block_others() {
        let broadcaster = Arc::new(Broadcaster::new(8, 10, SEND_TIMEOUT));

        let mut receivers = Vec::new();

        for _ in 0..2 {
            let subscription = broadcaster.subscribe().unwrap();
            let (tx, rx) = mpsc::channel::<Payload>(16);
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move { broadcaster.forward(subscription, tx, vec![]).await });
            receivers.push(rx);
        }

        let stalled = broadcaster.subscribe().unwrap();
        let handle = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move { broadcaster.forward(stalled, Stalled, vec![]).await })
        };

        assert_eq!(broadcaster.count(), 3);
        broadcaster.publish(&pvt(7));

        // healthy subscribers are served well within the send timeout
        for rx in receivers.iter_mut() {
            let payload = timeout(SEND_TIMEOUT / 2, rx.recv()).await.unwrap().unwrap();
            assert_eq!(valid_sats(&payload), 7);
        }

        // the stalled one times out and is unregistered
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(TransportSendError::Timeout)));
        assert_eq!(broadcaster.count(), 2);

        assert_eq!(broadcaster.publish(&pvt(8)), 2);
        for rx in receivers.iter_mut() {
            let payload = timeout(SEND_TIMEOUT / 2, rx.recv()).await.unwrap().unwrap();
            assert_eq!(valid_sats(&payload), 8);
        }
    }

    #[tokio::test]
    async fn snapshot_is_sent_first() {
        let broadcaster = Arc::new(Broadcaster::new(8, 10, SEND_TIMEOUT));

        let subscription = broadcaster.subscribe().unwrap();
        let id = subscription.id();
        broadcaster.publish(&pvt(9));

        let snapshot = vec![Broadcaster::encode(&pvt(5)).unwrap()];
        let (tx, mut rx) = mpsc::channel::<Payload>(16);

        let task = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move { broadcaster.forward(subscription, tx, snapshot).await })
        };

        assert_eq!(valid_sats(&rx.recv().await.unwrap()), 5);
        assert_eq!(valid_sats(&rx.recv().await.unwrap()), 9);

        // transport side closes: forwarding ends on next delivery
        drop(rx);
        broadcaster.publish(&pvt(10));

        let result = task.await.unwrap();
        assert!(matches!(result, Err(TransportSendError::Closed)));
        assert!(!broadcaster.unsubscribe(id));
    }
}

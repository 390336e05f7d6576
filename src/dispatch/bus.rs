//! Channel-based fan-out.
//!
//! Every subscriber owns an unbounded queue drained by its own task, so one
//! slow or failing handler never holds up the publisher or its siblings.
//! Events are queued to subscribers in subscription order while the registry
//! lock is held; each subscriber therefore sees events in publish order.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, Weak,
};

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::mpsc;

#[async_trait]
pub trait Subscriber<T>: Send + Sync + 'static {
    async fn handle(&self, event: T) -> Result<()>;
}

/// Adapts a plain closure into a [`Subscriber`].
pub struct FnSubscriber<F>(pub F);

#[async_trait]
impl<T, F> Subscriber<T> for FnSubscriber<F>
where
    T: Send + 'static,
    F: Fn(T) -> Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, event: T) -> Result<()> {
        (self.0)(event)
    }
}

struct Slot<T> {
    id: u64,
    tx: mpsc::UnboundedSender<T>,
}

struct BusInner<T> {
    name: &'static str,
    slots: Mutex<Vec<Slot<T>>>,
    next_id: AtomicU64,
}

trait SlotRegistry: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<T: Send> SlotRegistry for BusInner<T> {
    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        // Dropping the sender lets the worker drain what is queued, then exit.
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }
}

pub struct DispatchBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for DispatchBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> DispatchBus<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(BusInner {
                name,
                slots: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a subscriber. Must be called from within a Tokio runtime.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(subscriber_worker(self.inner.name, id, subscriber, rx));

        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Slot { id, tx });

        let registry: Weak<dyn SlotRegistry> = Arc::downgrade(&self.inner) as Weak<dyn SlotRegistry>;
        Subscription {
            id,
            registry: Some(registry),
        }
    }

    pub fn subscribe_fn<F>(&self, handler: F) -> Subscription
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber(handler)))
    }

    /// Queue `event` for every current subscriber; returns how many.
    pub fn publish(&self, event: T) -> usize {
        let slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut delivered = 0;
        for slot in slots.iter() {
            if slot.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("{} subscriber {} is gone", self.inner.name, slot.id);
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn subscriber_worker<T: Send + 'static>(
    bus: &'static str,
    id: u64,
    subscriber: Arc<dyn Subscriber<T>>,
    mut rx: mpsc::UnboundedReceiver<T>,
) {
    while let Some(event) = rx.recv().await {
        let handler = Arc::clone(&subscriber);
        // A separate task contains panics to this one delivery.
        match tokio::spawn(async move { handler.handle(event).await }).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("{bus} subscriber {id} failed: {err:#}"),
            Err(join_err) => error!("{bus} subscriber {id} panicked: {join_err}"),
        }
    }
    debug!("{bus} subscriber {id} finished");
}

/// Handle for one registration. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn SlotRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `false` if the bus is gone or the subscription was already removed.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the subscriber registered for as long as the bus lives.
    pub fn detach(mut self) {
        self.registry = None;
    }

    fn release(&mut self) -> bool {
        match self.registry.take().and_then(|weak| weak.upgrade()) {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::time::Duration;

    async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("channel closed")
    }

    fn collector(bus: &DispatchBus<u32>) -> (Subscription, mpsc::UnboundedReceiver<u32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe_fn(move |event| {
            tx.send(event)?;
            Ok(())
        });
        (sub, rx)
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_event_in_order() {
        let bus = DispatchBus::new("test");
        let (_a, mut rx_a) = collector(&bus);
        let (_b, mut rx_b) = collector(&bus);

        for n in 0..50 {
            assert_eq!(bus.publish(n), 2);
        }
        for n in 0..50 {
            assert_eq!(recv(&mut rx_a).await, n);
            assert_eq!(recv(&mut rx_b).await, n);
        }
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_do_not_block_others() {
        let bus = DispatchBus::new("test");
        let _failing = bus.subscribe_fn(|_: u32| bail!("boom"));
        let _panicking = bus.subscribe_fn(|n: u32| {
            if n == 1 {
                panic!("handler panic");
            }
            Ok(())
        });
        let (_ok, mut rx) = collector(&bus);

        bus.publish(1);
        bus.publish(2);
        assert_eq!(recv(&mut rx).await, 1);
        assert_eq!(recv(&mut rx).await, 2);
    }

    #[tokio::test]
    async fn panicking_subscriber_keeps_receiving() {
        let bus = DispatchBus::new("test");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe_fn(move |n: u32| {
            if n == 0 {
                panic!("first delivery panics");
            }
            tx.send(n)?;
            Ok(())
        });

        bus.publish(0);
        bus.publish(7);
        assert_eq!(recv(&mut rx).await, 7);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_for_that_subscriber_only() {
        let bus = DispatchBus::new("test");
        let (a, mut rx_a) = collector(&bus);
        let (_b, mut rx_b) = collector(&bus);

        bus.publish(1);
        assert!(a.unsubscribe());
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(2);

        assert_eq!(recv(&mut rx_a).await, 1);
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), rx_a.recv())
                .await
                .expect("worker should exit"),
            None
        );
        assert_eq!(recv(&mut rx_b).await, 1);
        assert_eq!(recv(&mut rx_b).await, 2);
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bus = DispatchBus::<u32>::new("test");
        {
            let (_sub, _rx) = collector(&bus);
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(5), 0);
    }

    #[tokio::test]
    async fn detached_subscription_survives_drop() {
        let bus = DispatchBus::new("test");
        let (sub, mut rx) = collector(&bus);
        sub.detach();
        bus.publish(3);
        assert_eq!(recv(&mut rx).await, 3);
        assert_eq!(bus.subscriber_count(), 1);
    }
}

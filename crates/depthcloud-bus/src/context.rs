use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvError, Selector, Sender, TrySendError};

use crate::error::BusError;

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Block on `selector` until it fires or `deadline` passes.
///
/// `None` as deadline waits without bound. Returns `None` on timeout.
pub(crate) fn wait_until<R>(selector: Selector<'_, R>, deadline: Option<Instant>) -> Option<R> {
    match deadline {
        Some(deadline) => selector.wait_deadline(deadline).ok(),
        None => Some(selector.wait()),
    }
}

struct TopicEntry {
    type_id: TypeId,
    type_name: &'static str,
    topic: Arc<dyn Any + Send + Sync>,
}

struct ContextInner {
    topics: Mutex<HashMap<String, TopicEntry>>,
    // dropped on shutdown, which disconnects every `shutdown_rx` clone
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
}

/// A handle to the process-wide topic registry.
///
/// Cloning the context is cheap and every clone refers to the same topics.
/// Publishers and subscribers meet on a topic by name; the first side that
/// touches a topic fixes its message type.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use depthcloud_bus::Context;
///
/// let ctx = Context::new();
/// let publisher = ctx.advertise::<u32>("counter", 1, true).unwrap();
/// publisher.publish(7);
///
/// // latched topics replay the last message to late subscribers
/// let msg = ctx.wait_for_message::<u32>("counter", Duration::from_millis(10)).unwrap();
/// assert_eq!(*msg, 7);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = flume::bounded(0);
        Self {
            inner: Arc::new(ContextInner {
                topics: Mutex::new(HashMap::new()),
                shutdown_tx: Mutex::new(Some(shutdown_tx)),
                shutdown_rx,
            }),
        }
    }

    /// Request shutdown. Every blocking receive returns [`BusError::Shutdown`].
    pub fn shutdown(&self) {
        if lock(&self.inner.shutdown_tx).take().is_some() {
            log::debug!("bus shutdown requested");
        }
    }

    /// Check whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown_rx.is_disconnected()
    }

    /// A receiver that never yields a message and disconnects on shutdown.
    ///
    /// Add it to a [`flume::Selector`] to wake a blocking wait on shutdown.
    pub fn shutdown_signal(&self) -> Receiver<()> {
        self.inner.shutdown_rx.clone()
    }

    fn topic<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<Topic<T>>, BusError> {
        let mut topics = lock(&self.inner.topics);
        let entry = topics.entry(name.to_string()).or_insert_with(|| TopicEntry {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            topic: Arc::new(Topic::<T>::new()),
        });

        let mismatch = || BusError::TypeMismatch {
            topic: name.to_string(),
            existing: entry.type_name,
            requested: std::any::type_name::<T>(),
        };

        if entry.type_id != TypeId::of::<T>() {
            return Err(mismatch());
        }

        entry.topic.clone().downcast::<Topic<T>>().map_err(|_| mismatch())
    }

    /// Advertise a topic.
    ///
    /// # Arguments
    ///
    /// * `topic` - The topic name.
    /// * `queue_size` - Kept for parity with subscribers; publishing never blocks.
    /// * `latch` - Retain the last message and replay it to late subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::TypeMismatch`] if the topic carries another type.
    pub fn advertise<T: Send + Sync + 'static>(
        &self,
        topic: &str,
        queue_size: usize,
        latch: bool,
    ) -> Result<Publisher<T>, BusError> {
        let inner = self.topic::<T>(topic)?;
        log::debug!("advertised '{topic}' (queue {queue_size}, latch {latch})");
        Ok(Publisher {
            name: topic.to_string(),
            topic: inner,
            latch,
        })
    }

    /// Subscribe to a topic.
    ///
    /// The subscriber buffers up to `queue_size` messages, dropping the
    /// oldest when full. A latched message is delivered immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::TypeMismatch`] if the topic carries another type.
    pub fn subscribe<T: Send + Sync + 'static>(
        &self,
        topic: &str,
        queue_size: usize,
    ) -> Result<Subscriber<T>, BusError> {
        let inner = self.topic::<T>(topic)?;
        let (tx, rx) = flume::bounded(queue_size.max(1));
        let slot = Slot {
            tx,
            rx: rx.clone(),
        };

        {
            let mut state = lock(&inner.state);
            if let Some(latched) = &state.latched {
                slot.push(latched.clone());
            }
            state.subscribers.push(slot);
        }

        Ok(Subscriber {
            name: topic.to_string(),
            rx,
            shutdown: self.shutdown_signal(),
        })
    }

    /// Block until one message arrives on the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Timeout`] when nothing arrives within `timeout`
    /// and [`BusError::Shutdown`] when the context shuts down first.
    pub fn wait_for_message<T: Send + Sync + 'static>(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> Result<Arc<T>, BusError> {
        let subscriber = self.subscribe::<T>(topic, 1)?;
        subscriber.recv_timeout(timeout)
    }
}

/// The publishing side of one subscriber queue.
///
/// The slot keeps a receiver clone so a full queue can drop its oldest
/// message, and so a dropped subscriber shows as a receiver count of one.
struct Slot<T> {
    tx: Sender<Arc<T>>,
    rx: Receiver<Arc<T>>,
}

impl<T> Slot<T> {
    fn is_alive(&self) -> bool {
        self.tx.receiver_count() > 1
    }

    fn push(&self, mut msg: Arc<T>) {
        loop {
            match self.tx.try_send(msg) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.rx.try_recv();
                    msg = rejected;
                }
            }
        }
    }
}

struct TopicState<T> {
    subscribers: Vec<Slot<T>>,
    latched: Option<Arc<T>>,
}

struct Topic<T> {
    state: Mutex<TopicState<T>>,
}

impl<T> Topic<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(TopicState {
                subscribers: Vec::new(),
                latched: None,
            }),
        }
    }
}

/// Sends messages to every subscriber of a topic.
pub struct Publisher<T> {
    name: String,
    topic: Arc<Topic<T>>,
    latch: bool,
}

impl<T> Publisher<T> {
    /// The topic name.
    pub fn topic(&self) -> &str {
        &self.name
    }

    /// Publish a message.
    pub fn publish(&self, msg: impl Into<Arc<T>>) {
        let msg = msg.into();
        let mut state = lock(&self.topic.state);
        if self.latch {
            state.latched = Some(msg.clone());
        }
        state.subscribers.retain(Slot::is_alive);
        for slot in &state.subscribers {
            slot.push(msg.clone());
        }
    }

    /// Number of live subscribers.
    pub fn num_subscribers(&self) -> usize {
        lock(&self.topic.state)
            .subscribers
            .iter()
            .filter(|s| s.is_alive())
            .count()
    }
}

/// Receives messages from a topic.
pub struct Subscriber<T> {
    name: String,
    rx: Receiver<Arc<T>>,
    shutdown: Receiver<()>,
}

impl<T> Subscriber<T> {
    /// The topic name.
    pub fn topic(&self) -> &str {
        &self.name
    }

    /// The underlying queue, for waiting on several topics with a [`flume::Selector`].
    pub fn receiver(&self) -> &Receiver<Arc<T>> {
        &self.rx
    }

    /// Pop the oldest buffered message, if any.
    pub fn try_recv(&self) -> Option<Arc<T>> {
        self.rx.try_recv().ok()
    }

    /// Block until a message is available.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Timeout`] when nothing arrives within `timeout`
    /// and [`BusError::Shutdown`] when the context shuts down first.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Arc<T>, BusError> {
        // an unrepresentable deadline means waiting until shutdown
        let deadline = Instant::now().checked_add(timeout);
        if self.shutdown.is_disconnected() {
            return Err(BusError::Shutdown);
        }
        if let Some(msg) = self.try_recv() {
            return Ok(msg);
        }

        let selector = Selector::new()
            .recv(&self.rx, |msg: Result<Arc<T>, RecvError>| msg.ok())
            .recv(&self.shutdown, |_| None);
        match wait_until(selector, deadline) {
            Some(Some(msg)) => Ok(msg),
            Some(None) => Err(BusError::Shutdown),
            None => Err(BusError::Timeout(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_subscribe() -> Result<(), BusError> {
        let ctx = Context::new();
        let sub = ctx.subscribe::<String>("chatter", 4)?;
        let publisher = ctx.advertise::<String>("chatter", 1, false)?;
        assert_eq!(publisher.num_subscribers(), 1);

        publisher.publish("hello".to_string());
        let msg = sub.recv_timeout(Duration::from_millis(10))?;
        assert_eq!(msg.as_str(), "hello");
        assert!(sub.try_recv().is_none());
        Ok(())
    }

    #[test]
    fn test_queue_drops_oldest() -> Result<(), BusError> {
        let ctx = Context::new();
        let sub = ctx.subscribe::<u32>("numbers", 2)?;
        let publisher = ctx.advertise::<u32>("numbers", 1, false)?;
        for i in 0..5 {
            publisher.publish(i);
        }
        assert_eq!(sub.try_recv().as_deref(), Some(&3));
        assert_eq!(sub.try_recv().as_deref(), Some(&4));
        assert!(sub.try_recv().is_none());
        Ok(())
    }

    #[test]
    fn test_latched_replay() -> Result<(), BusError> {
        let ctx = Context::new();
        let publisher = ctx.advertise::<u32>("latched", 1, true)?;
        publisher.publish(1);
        publisher.publish(2);

        let late = ctx.subscribe::<u32>("latched", 1)?;
        assert_eq!(late.try_recv().as_deref(), Some(&2));

        let unlatched = ctx.advertise::<u32>("plain", 1, false)?;
        unlatched.publish(3);
        let late = ctx.subscribe::<u32>("plain", 1)?;
        assert!(late.try_recv().is_none());
        Ok(())
    }

    #[test]
    fn test_type_mismatch() {
        let ctx = Context::new();
        assert!(ctx.advertise::<u32>("topic", 1, false).is_ok());
        let err = ctx.subscribe::<String>("topic", 1).err();
        assert!(matches!(err, Some(BusError::TypeMismatch { .. })));
    }

    #[test]
    fn test_wait_for_message_timeout() {
        let ctx = Context::new();
        let res = ctx.wait_for_message::<u32>("silent", Duration::from_millis(20));
        assert_eq!(res.err(), Some(BusError::Timeout("silent".to_string())));
    }

    #[test]
    fn test_wait_for_message_from_thread() -> Result<(), BusError> {
        let ctx = Context::new();
        let publisher = ctx.advertise::<u32>("late", 1, false)?;
        let handle = std::thread::spawn(move || {
            while publisher.num_subscribers() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            publisher.publish(42);
        });
        let msg = ctx.wait_for_message::<u32>("late", Duration::from_secs(5))?;
        assert_eq!(*msg, 42);
        handle.join().expect("publisher thread panicked");
        Ok(())
    }

    #[test]
    fn test_shutdown_wakes_receivers() -> Result<(), BusError> {
        let ctx = Context::new();
        let sub = ctx.subscribe::<u32>("idle", 1)?;
        let handle = std::thread::spawn({
            let ctx = ctx.clone();
            move || {
                std::thread::sleep(Duration::from_millis(20));
                ctx.shutdown();
            }
        });
        let start = Instant::now();
        assert_eq!(
            sub.recv_timeout(Duration::from_secs(10)).err(),
            Some(BusError::Shutdown)
        );
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(ctx.is_shutdown());
        handle.join().expect("shutdown thread panicked");
        Ok(())
    }

    #[test]
    fn test_shutdown_ends_unbounded_wait() -> Result<(), BusError> {
        let ctx = Context::new();
        let sub = ctx.subscribe::<u32>("idle", 1)?;
        let handle = std::thread::spawn(move || sub.recv_timeout(Duration::MAX));
        std::thread::sleep(Duration::from_millis(20));
        ctx.shutdown();
        let res = handle.join().expect("receiver thread panicked");
        assert_eq!(res.err(), Some(BusError::Shutdown));
        Ok(())
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() -> Result<(), BusError> {
        let ctx = Context::new();
        let publisher = ctx.advertise::<u32>("numbers", 1, false)?;
        let sub = ctx.subscribe::<u32>("numbers", 1)?;
        assert_eq!(publisher.num_subscribers(), 1);
        drop(sub);
        assert_eq!(publisher.num_subscribers(), 0);
        publisher.publish(1);
        Ok(())
    }
}

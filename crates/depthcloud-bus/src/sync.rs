use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use depthcloud_msgs::Stamped;
use flume::{Receiver, RecvError, Selector};

use crate::context::{wait_until, Context, Subscriber};
use crate::error::BusError;

/// Pairs messages from two streams whose stamps are close but not identical.
///
/// Each stream is buffered in a queue bounded by `queue_size`. The pivot is
/// the later of the two queue heads and its partner is the message of the
/// other stream closest to it in time. A pair is only emitted once the other
/// stream holds a message stamped at or after the pivot, since no later
/// arrival can then be closer. The emitted messages and everything older are
/// discarded.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use depthcloud_bus::ApproximateTimeSync;
/// use depthcloud_msgs::{Header, ImageMsg, Time};
///
/// let image = |ms: u64| {
///     Arc::new(ImageMsg {
///         header: Header::new(Time::from_nanos(ms * 1_000_000), "camera"),
///         ..Default::default()
///     })
/// };
///
/// let mut sync = ApproximateTimeSync::<ImageMsg, ImageMsg>::new(10);
/// assert!(sync.push_a(image(100)).is_none());
/// assert!(sync.push_b(image(100)).is_some());
/// ```
pub struct ApproximateTimeSync<A, B> {
    queue_a: VecDeque<Arc<A>>,
    queue_b: VecDeque<Arc<B>>,
    queue_size: usize,
    max_interval: Option<Duration>,
}

/// Insert keeping the queue sorted by stamp and bounded in size.
fn insert_sorted<T: Stamped>(queue: &mut VecDeque<Arc<T>>, msg: Arc<T>, queue_size: usize) {
    let idx = queue.partition_point(|m| m.stamp() <= msg.stamp());
    queue.insert(idx, msg);
    while queue.len() > queue_size {
        queue.pop_front();
    }
}

/// Index of the message closest to `pivot`, if the choice can no longer change.
fn decided_partner<T: Stamped>(queue: &VecDeque<Arc<T>>, pivot: &impl Stamped) -> Option<usize> {
    let last = queue.back()?;
    if last.stamp() < pivot.stamp() {
        return None;
    }
    queue
        .iter()
        .enumerate()
        .min_by_key(|(_, m)| m.stamp().abs_diff(pivot.stamp()))
        .map(|(idx, _)| idx)
}

impl<A: Stamped, B: Stamped> ApproximateTimeSync<A, B> {
    /// Create a synchronizer buffering up to `queue_size` messages per stream.
    pub fn new(queue_size: usize) -> Self {
        let queue_size = queue_size.max(1);
        Self {
            queue_a: VecDeque::with_capacity(queue_size),
            queue_b: VecDeque::with_capacity(queue_size),
            queue_size,
            max_interval: None,
        }
    }

    /// Reject pairs whose stamps are further apart than `max_interval`.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    /// Number of buffered messages in each stream.
    pub fn pending(&self) -> (usize, usize) {
        (self.queue_a.len(), self.queue_b.len())
    }

    /// Feed a message of the first stream.
    pub fn push_a(&mut self, msg: Arc<A>) -> Option<(Arc<A>, Arc<B>)> {
        insert_sorted(&mut self.queue_a, msg, self.queue_size);
        self.try_match()
    }

    /// Feed a message of the second stream.
    pub fn push_b(&mut self, msg: Arc<B>) -> Option<(Arc<A>, Arc<B>)> {
        insert_sorted(&mut self.queue_b, msg, self.queue_size);
        self.try_match()
    }

    fn too_far(&self, gap: Duration) -> bool {
        self.max_interval.is_some_and(|max| gap > max)
    }

    fn try_match(&mut self) -> Option<(Arc<A>, Arc<B>)> {
        loop {
            let head_a = self.queue_a.front()?.clone();
            let head_b = self.queue_b.front()?.clone();

            if head_a.stamp() >= head_b.stamp() {
                let idx = decided_partner(&self.queue_b, head_a.as_ref())?;
                let gap = self.queue_b[idx].stamp().abs_diff(head_a.stamp());
                if self.too_far(gap) {
                    log::debug!("dropping unmatched message at {}", head_a.stamp());
                    self.queue_a.pop_front();
                    continue;
                }
                let partner = self.queue_b.drain(..=idx).last()?;
                self.queue_a.pop_front();
                return Some((head_a, partner));
            }

            let idx = decided_partner(&self.queue_a, head_b.as_ref())?;
            let gap = self.queue_a[idx].stamp().abs_diff(head_b.stamp());
            if self.too_far(gap) {
                log::debug!("dropping unmatched message at {}", head_b.stamp());
                self.queue_b.pop_front();
                continue;
            }
            let partner = self.queue_a.drain(..=idx).last()?;
            self.queue_b.pop_front();
            return Some((partner, head_b));
        }
    }
}

/// Two subscribers feeding an [`ApproximateTimeSync`].
pub struct SyncedSubscriber<A, B> {
    sub_a: Subscriber<A>,
    sub_b: Subscriber<B>,
    sync: ApproximateTimeSync<A, B>,
    shutdown: Receiver<()>,
}

enum Arrival<A, B> {
    A(Arc<A>),
    B(Arc<B>),
    Shutdown,
}

impl<A: Stamped, B: Stamped> SyncedSubscriber<A, B> {
    /// Combine two subscribers of `ctx` with a synchronizer.
    pub fn new(
        ctx: &Context,
        sub_a: Subscriber<A>,
        sub_b: Subscriber<B>,
        sync: ApproximateTimeSync<A, B>,
    ) -> Self {
        Self {
            sub_a,
            sub_b,
            sync,
            shutdown: ctx.shutdown_signal(),
        }
    }

    /// Block until a pair of correlated messages is available.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Timeout`] naming the first topic when no pair forms
    /// within `timeout`, and [`BusError::Shutdown`] on context shutdown.
    pub fn next_pair(&mut self, timeout: Duration) -> Result<(Arc<A>, Arc<B>), BusError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.shutdown.is_disconnected() {
                return Err(BusError::Shutdown);
            }

            let selector = Selector::new()
                .recv(self.sub_a.receiver(), |msg: Result<Arc<A>, RecvError>| {
                    msg.map_or(Arrival::Shutdown, Arrival::A)
                })
                .recv(self.sub_b.receiver(), |msg: Result<Arc<B>, RecvError>| {
                    msg.map_or(Arrival::Shutdown, Arrival::B)
                })
                .recv(&self.shutdown, |_| Arrival::Shutdown);

            let pair = match wait_until(selector, deadline) {
                Some(Arrival::A(a)) => self.sync.push_a(a),
                Some(Arrival::B(b)) => self.sync.push_b(b),
                Some(Arrival::Shutdown) => return Err(BusError::Shutdown),
                None => return Err(BusError::Timeout(self.sub_a.topic().to_string())),
            };
            if let Some(pair) = pair {
                return Ok(pair);
            }
        }
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use depthcloud_3d::RigidTransform;
use depthcloud_bus::{BusError, Context, Subscriber};
use depthcloud_msgs::{TfMessage, Time};
use flume::{Receiver, RecvError, Selector, Sender, TrySendError};

use crate::buffer::TransformBuffer;
use crate::error::TfError;
use crate::{TF_STATIC_TOPIC, TF_TOPIC};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the listener thread.
#[derive(Default)]
struct Shared {
    buffer: Mutex<TransformBuffer>,
    // one sender per pending `wait_for_transform`
    updates: Mutex<Vec<Sender<()>>>,
}

impl Shared {
    fn store(&self, msg: &TfMessage, is_static: bool) {
        {
            let mut buffer = lock(&self.buffer);
            for transform in &msg.transforms {
                if let Err(e) = buffer.set_transform(transform, is_static) {
                    log::warn!("ignoring transform: {e}");
                }
            }
        }
        lock(&self.updates)
            .retain(|tx| !matches!(tx.try_send(()), Err(TrySendError::Disconnected(_))));
    }
}

enum Event {
    Received(Arc<TfMessage>, bool),
    Stop,
}

/// Collects broadcast transforms into a [`TransformBuffer`] on a
/// background thread.
///
/// The thread stops when the listener is dropped or the context shuts down.
pub struct TransformListener {
    ctx: Context,
    shared: Arc<Shared>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TransformListener {
    /// Subscribe to `/tf` and `/tf_static` and start collecting.
    pub fn new(ctx: &Context) -> Result<Self, TfError> {
        Self::with_buffer(ctx, TransformBuffer::default())
    }

    /// Start collecting into an existing buffer.
    pub fn with_buffer(ctx: &Context, buffer: TransformBuffer) -> Result<Self, TfError> {
        let dynamic = ctx.subscribe::<TfMessage>(TF_TOPIC, 100)?;
        let fixed = ctx.subscribe::<TfMessage>(TF_STATIC_TOPIC, 100)?;

        let shared = Arc::new(Shared {
            buffer: Mutex::new(buffer),
            ..Default::default()
        });
        // never sent on, dropping the sender stops the thread
        let (stop_tx, stop_rx) = flume::bounded(0);

        let handle = std::thread::Builder::new()
            .name("tf_listener".to_string())
            .spawn({
                let shared = shared.clone();
                let shutdown = ctx.shutdown_signal();
                move || Self::run(&dynamic, &fixed, &shared, &stop_rx, &shutdown)
            })?;

        Ok(Self {
            ctx: ctx.clone(),
            shared,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn run(
        dynamic: &Subscriber<TfMessage>,
        fixed: &Subscriber<TfMessage>,
        shared: &Shared,
        stop: &Receiver<()>,
        shutdown: &Receiver<()>,
    ) {
        loop {
            let event = Selector::new()
                .recv(fixed.receiver(), |msg: Result<Arc<TfMessage>, RecvError>| {
                    msg.map_or(Event::Stop, |msg| Event::Received(msg, true))
                })
                .recv(dynamic.receiver(), |msg: Result<Arc<TfMessage>, RecvError>| {
                    msg.map_or(Event::Stop, |msg| Event::Received(msg, false))
                })
                .recv(stop, |_| Event::Stop)
                .recv(shutdown, |_| Event::Stop)
                .wait();

            match event {
                Event::Received(msg, is_static) => shared.store(&msg, is_static),
                Event::Stop => break,
            }
        }
        log::debug!("tf listener stopped");
    }

    /// A snapshot of the collected transforms.
    pub fn buffer(&self) -> TransformBuffer {
        lock(&self.shared.buffer).clone()
    }

    /// Look up `target_T_source` in the collected transforms.
    ///
    /// See [`TransformBuffer::lookup_transform`].
    pub fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: Time,
    ) -> Result<RigidTransform, TfError> {
        lock(&self.shared.buffer).lookup_transform(target, source, time)
    }

    /// Check whether a lookup would succeed now.
    pub fn can_transform(&self, target: &str, source: &str, time: Time) -> bool {
        lock(&self.shared.buffer).can_transform(target, source, time)
    }

    /// Block until a lookup succeeds or `timeout` elapses.
    ///
    /// The lookup is retried each time the listener stores new transforms.
    ///
    /// # Errors
    ///
    /// Returns [`TfError::Timeout`] when the transform does not become
    /// available in time and [`TfError::Bus`] when the context shuts down.
    pub fn wait_for_transform(
        &self,
        target: &str,
        source: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<RigidTransform, TfError> {
        let deadline = Instant::now().checked_add(timeout);
        let shutdown = self.ctx.shutdown_signal();
        let (tx, updated) = flume::bounded(1);
        // registered before the first lookup so no update is missed
        lock(&self.shared.updates).push(tx);

        loop {
            if shutdown.is_disconnected() {
                return Err(BusError::Shutdown.into());
            }
            if let Ok(transform) = self.lookup_transform(target, source, time) {
                return Ok(transform);
            }

            let selector = Selector::new()
                .recv(&updated, |_| true)
                .recv(&shutdown, |_| false);
            let woke = match deadline {
                Some(deadline) => selector.wait_deadline(deadline).ok(),
                None => Some(selector.wait()),
            };
            match woke {
                Some(true) => continue,
                Some(false) => return Err(BusError::Shutdown.into()),
                None => {
                    return Err(TfError::Timeout {
                        target: target.to_string(),
                        source_frame: source.to_string(),
                        timeout,
                    })
                }
            }
        }
    }
}

impl Drop for TransformListener {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("tf listener thread panicked");
            }
        }
    }
}

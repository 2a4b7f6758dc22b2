#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Topic registry, publishers and subscribers.
pub mod context;

/// Error types for the bus module.
pub mod error;

/// Approximate time pairing of two message streams.
pub mod sync;

pub use crate::context::{Context, Publisher, Subscriber};
pub use crate::error::BusError;
pub use crate::sync::{ApproximateTimeSync, SyncedSubscriber};

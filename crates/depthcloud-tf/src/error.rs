use std::time::Duration;

use depthcloud_bus::BusError;
use depthcloud_msgs::Time;

/// An error type for the tf module.
#[derive(thiserror::Error, Debug)]
pub enum TfError {
    /// A frame is unknown or the two frames are not connected.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// The requested time lies outside the tracked history of a link.
    #[error(
        "Extrapolation: '{frame}' was requested at {requested} but is known from {oldest} to {newest}"
    )]
    Extrapolation {
        /// The child frame of the link.
        frame: String,
        /// The requested time.
        requested: Time,
        /// The oldest tracked sample.
        oldest: Time,
        /// The newest tracked sample.
        newest: Time,
    },

    /// No transform became available within the wait bound.
    #[error("Timed out after {timeout:?} waiting for '{target}' <- '{source_frame}'")]
    Timeout {
        /// The target frame.
        target: String,
        /// The source frame.
        source_frame: String,
        /// The wait bound.
        timeout: Duration,
    },

    /// A received transform cannot be stored.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// The listener thread could not be started.
    #[error("Failed to start the listener thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Error from the transport.
    #[error(transparent)]
    Bus(#[from] BusError),
}

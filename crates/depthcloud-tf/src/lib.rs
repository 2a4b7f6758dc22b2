#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Transform history and frame graph queries.
pub mod buffer;

/// Publishers of transforms.
pub mod broadcaster;

/// Error types for the tf module.
pub mod error;

/// Background collection of broadcast transforms.
pub mod listener;

pub use crate::broadcaster::{StaticTransformBroadcaster, TransformBroadcaster};
pub use crate::buffer::TransformBuffer;
pub use crate::error::TfError;
pub use crate::listener::TransformListener;

/// Topic carrying dynamic transforms.
pub const TF_TOPIC: &str = "/tf";

/// Latched topic carrying static transforms.
pub const TF_STATIC_TOPIC: &str = "/tf_static";

#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Topic names, frames and timeouts of the pipeline.
pub mod config;

/// Error types for the demo.
pub mod error;

/// The one-shot RGB-D to point cloud pipeline.
pub mod node;

/// A simulated head camera for standalone runs.
pub mod sim;

pub use crate::config::{PipelineConfig, Topics};
pub use crate::error::DemoError;
pub use crate::node::PointCloudNode;
pub use crate::sim::{SimCamera, SimConfig};

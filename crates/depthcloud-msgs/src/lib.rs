#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Timestamps and message headers.
pub mod time;

/// Camera image and calibration messages.
pub mod sensor;

/// Packed point cloud messages.
pub mod pointcloud;

/// Coordinate frame transform messages.
pub mod geometry;

pub use crate::geometry::{Quaternion, TfMessage, Transform, TransformStamped, Vector3};
pub use crate::pointcloud::{PointCloud2, PointField, PointFieldDatatype};
pub use crate::sensor::{CameraInfo, ImageMsg};
pub use crate::time::{Header, Stamped, Time};

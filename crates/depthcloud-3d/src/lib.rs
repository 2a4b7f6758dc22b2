#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model.
pub mod camera;

/// Conversions between point clouds and packed point cloud messages.
pub mod conversions;

/// Error types for the 3d module.
pub mod error;

/// I/O utilities for reading and writing 3D data.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud representation.
pub mod pointcloud;

/// Back-projection of RGB-D images into colored point clouds.
pub mod rgbd;

/// 3D transforms algorithms.
pub mod transforms;

pub use crate::camera::PinholeCamera;
pub use crate::error::PointCloudError;
pub use crate::pointcloud::PointCloud;
pub use crate::rgbd::RgbdPointCloud;
pub use crate::transforms::RigidTransform;

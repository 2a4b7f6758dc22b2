use depthcloud::bus::BusError;
use depthcloud::image::ImageError;
use depthcloud::k3d::io::pcd::PcdError;
use depthcloud::k3d::PointCloudError;
use depthcloud::tf::TfError;

/// An error type for the point cloud demo.
#[derive(thiserror::Error, Debug)]
pub enum DemoError {
    /// No correlated color and depth pair arrived.
    #[error("No synchronized images: {0}")]
    Images(#[source] BusError),

    /// No calibration arrived within the wait bound.
    #[error("No camera calibration: {0}")]
    Calibration(#[source] BusError),

    /// An image could not be decoded.
    #[error("Image decode failed: {0}")]
    Decode(#[from] ImageError),

    /// Back-projection or cloud packing failed.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),

    /// The sensor frame cannot be expressed in the target frame.
    #[error(transparent)]
    Transform(#[from] TfError),

    /// The transport refused a publisher or subscriber.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The cloud could not be written to disk.
    #[error(transparent)]
    Pcd(#[from] PcdError),

    /// A background thread could not be started.
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

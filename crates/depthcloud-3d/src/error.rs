use depthcloud_image::{ImageError, ImageSize};

/// An error type for the 3d module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PointCloudError {
    /// The number of colors differs from the number of points.
    #[error("Color count ({0}) does not match point count ({1})")]
    ColorCountMismatch(usize, usize),

    /// The calibration cannot describe a pinhole camera.
    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// Two images or an image and its calibration disagree in size.
    #[error("Image size mismatch: expected {expected}, found {found}")]
    SizeMismatch {
        /// The size of the reference.
        expected: ImageSize,
        /// The offending size.
        found: ImageSize,
    },

    /// A required field of a packed cloud is absent or not float32.
    #[error("Point cloud field '{0}' is missing or not float32")]
    MissingField(String),

    /// The packed buffer is shorter than its declared layout.
    #[error("Malformed point cloud buffer: {0}")]
    Malformed(String),

    /// The rotation cannot be normalized.
    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),

    /// The translation has a non finite component.
    #[error("Invalid translation: {0}")]
    InvalidTranslation(String),

    /// Error while reading the input images.
    #[error(transparent)]
    Image(#[from] ImageError),
}

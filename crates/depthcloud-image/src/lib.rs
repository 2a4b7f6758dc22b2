#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image representation for computer vision purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// Pixel encoding tags of transport images.
pub mod encoding;

/// Conversion of transport images into typed images.
pub mod bridge;

pub use crate::bridge::{decode_color, decode_depth, DepthImage};
pub use crate::encoding::ImageEncoding;
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};

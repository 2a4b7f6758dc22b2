use std::str::FromStr;

use crate::error::ImageError;

/// Pixel layout of a transport image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageEncoding {
    /// 8-bit red, green, blue.
    Rgb8,
    /// 8-bit blue, green, red.
    Bgr8,
    /// 8-bit red, green, blue, alpha.
    Rgba8,
    /// 8-bit blue, green, red, alpha.
    Bgra8,
    /// 8-bit grayscale.
    Mono8,
    /// 16-bit grayscale.
    Mono16,
    /// Single channel 16-bit unsigned depth in millimeters (`16UC1`).
    Depth16U,
    /// Single channel 32-bit float depth in meters (`32FC1`).
    Depth32F,
}

impl ImageEncoding {
    /// The canonical tag of the encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Rgb8 => "rgb8",
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Rgba8 => "rgba8",
            ImageEncoding::Bgra8 => "bgra8",
            ImageEncoding::Mono8 => "mono8",
            ImageEncoding::Mono16 => "mono16",
            ImageEncoding::Depth16U => "16UC1",
            ImageEncoding::Depth32F => "32FC1",
        }
    }

    /// Number of channels per pixel.
    pub fn channels(&self) -> usize {
        match self {
            ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => 3,
            ImageEncoding::Rgba8 | ImageEncoding::Bgra8 => 4,
            ImageEncoding::Mono8
            | ImageEncoding::Mono16
            | ImageEncoding::Depth16U
            | ImageEncoding::Depth32F => 1,
        }
    }

    /// Number of bytes per channel.
    pub fn bytes_per_channel(&self) -> usize {
        match self {
            ImageEncoding::Mono16 | ImageEncoding::Depth16U => 2,
            ImageEncoding::Depth32F => 4,
            _ => 1,
        }
    }

    /// Number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels() * self.bytes_per_channel()
    }

    /// Whether the encoding carries depth rather than intensity.
    pub fn is_depth(&self) -> bool {
        matches!(self, ImageEncoding::Depth16U | ImageEncoding::Depth32F)
    }
}

impl FromStr for ImageEncoding {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb8" => Ok(ImageEncoding::Rgb8),
            "bgr8" => Ok(ImageEncoding::Bgr8),
            "rgba8" => Ok(ImageEncoding::Rgba8),
            "bgra8" => Ok(ImageEncoding::Bgra8),
            "mono8" | "8UC1" => Ok(ImageEncoding::Mono8),
            "mono16" => Ok(ImageEncoding::Mono16),
            "16UC1" => Ok(ImageEncoding::Depth16U),
            "32FC1" => Ok(ImageEncoding::Depth32F),
            other => Err(ImageError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl std::fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoding() -> Result<(), ImageError> {
        assert_eq!("bgr8".parse::<ImageEncoding>()?, ImageEncoding::Bgr8);
        assert_eq!("8UC1".parse::<ImageEncoding>()?, ImageEncoding::Mono8);
        assert_eq!("32FC1".parse::<ImageEncoding>()?.bytes_per_pixel(), 4);
        assert_eq!(ImageEncoding::Bgra8.bytes_per_pixel(), 4);
        assert!(ImageEncoding::Depth16U.is_depth());
        assert_eq!(
            "yuv422".parse::<ImageEncoding>().err(),
            Some(ImageError::UnsupportedEncoding("yuv422".to_string()))
        );
        Ok(())
    }
}

use crate::time::{Header, Stamped};

/// An uncompressed image as produced by a camera driver.
///
/// The pixel buffer is stored row by row, with `step` bytes per row. The
/// `encoding` tag names the pixel layout, e.g. `bgr8` or `32FC1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageMsg {
    /// Acquisition time and optical frame of the image.
    pub header: Header,
    /// Number of rows.
    pub height: u32,
    /// Number of columns.
    pub width: u32,
    /// Pixel encoding tag.
    pub encoding: String,
    /// Whether multi-byte channels are stored big endian.
    pub is_bigendian: bool,
    /// Row length in bytes.
    pub step: u32,
    /// The raw pixel bytes, `step * height` long.
    pub data: Vec<u8>,
}

impl Stamped for ImageMsg {
    fn header(&self) -> &Header {
        &self.header
    }
}

/// Calibration of a pinhole camera.
///
/// `k` is the row-major 3x3 intrinsic matrix:
///
/// ```text
/// [fx  0 cx]
/// [ 0 fy cy]
/// [ 0  0  1]
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CameraInfo {
    /// Stamp and the optical frame the camera captures in.
    pub header: Header,
    /// Calibrated image height.
    pub height: u32,
    /// Calibrated image width.
    pub width: u32,
    /// Name of the distortion model, e.g. `plumb_bob`.
    pub distortion_model: String,
    /// Distortion coefficients.
    pub d: Vec<f64>,
    /// Intrinsic matrix.
    pub k: [f64; 9],
    /// Rectification matrix.
    pub r: [f64; 9],
    /// Projection matrix.
    pub p: [f64; 12],
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            header: Header::default(),
            height: 0,
            width: 0,
            distortion_model: String::new(),
            d: Vec::new(),
            k: [0.0; 9],
            r: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            p: [0.0; 12],
        }
    }
}

impl CameraInfo {
    /// Build an undistorted calibration from focal lengths and principal point.
    pub fn from_intrinsics(
        header: Header,
        width: u32,
        height: u32,
        (fx, fy): (f64, f64),
        (cx, cy): (f64, f64),
    ) -> Self {
        Self {
            header,
            height,
            width,
            distortion_model: "plumb_bob".to_string(),
            d: vec![0.0; 5],
            k: [fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0],
            p: [fx, 0.0, cx, 0.0, 0.0, fy, cy, 0.0, 0.0, 0.0, 1.0, 0.0],
            ..Default::default()
        }
    }

    /// Focal length along x in pixels.
    pub fn fx(&self) -> f64 {
        self.k[0]
    }

    /// Focal length along y in pixels.
    pub fn fy(&self) -> f64 {
        self.k[4]
    }

    /// Principal point x coordinate in pixels.
    pub fn cx(&self) -> f64 {
        self.k[2]
    }

    /// Principal point y coordinate in pixels.
    pub fn cy(&self) -> f64 {
        self.k[5]
    }
}

impl Stamped for CameraInfo {
    fn header(&self) -> &Header {
        &self.header
    }
}

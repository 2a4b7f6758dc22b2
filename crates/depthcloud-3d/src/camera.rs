use depthcloud_image::ImageSize;
use depthcloud_msgs::CameraInfo;

use crate::error::PointCloudError;

/// The intrinsic parameters of a pinhole camera.
///
/// # Fields
///
/// * `fx` - The focal length in the x direction
/// * `fy` - The focal length in the y direction
/// * `cx` - The x coordinate of the principal point
/// * `cy` - The y coordinate of the principal point
/// * `size` - The calibrated resolution, if known
#[derive(Clone, Debug, PartialEq)]
pub struct PinholeCamera {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
    /// The calibrated resolution, if known
    pub size: Option<ImageSize>,
}

impl PinholeCamera {
    /// Back-project a pixel with a depth along the optical axis.
    ///
    /// # Arguments
    ///
    /// * `u` - The pixel column.
    /// * `v` - The pixel row.
    /// * `depth` - The distance along the optical axis.
    ///
    /// # Returns
    ///
    /// The point in the camera optical frame (x right, y down, z forward).
    ///
    /// Example:
    ///
    /// ```
    /// use depthcloud_3d::PinholeCamera;
    ///
    /// let camera = PinholeCamera { fx: 100.0, fy: 100.0, cx: 50.0, cy: 50.0, size: None };
    /// assert_eq!(camera.unproject(150.0, 50.0, 2.0), [2.0, 0.0, 2.0]);
    /// ```
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> [f64; 3] {
        [
            (u - self.cx) * depth / self.fx,
            (v - self.cy) * depth / self.fy,
            depth,
        ]
    }

    /// Project a point in the optical frame onto the image plane.
    ///
    /// Returns `None` for points on or behind the camera.
    pub fn project(&self, point: &[f64; 3]) -> Option<[f64; 2]> {
        let [x, y, z] = *point;
        if z <= 0.0 {
            return None;
        }
        Some([self.fx * x / z + self.cx, self.fy * y / z + self.cy])
    }
}

impl TryFrom<&CameraInfo> for PinholeCamera {
    type Error = PointCloudError;

    fn try_from(info: &CameraInfo) -> Result<Self, Self::Error> {
        let (fx, fy, cx, cy) = (info.fx(), info.fy(), info.cx(), info.cy());

        if !(fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0) {
            return Err(PointCloudError::InvalidIntrinsics(format!(
                "focal lengths must be positive, got fx={fx} fy={fy}"
            )));
        }
        if !(cx.is_finite() && cy.is_finite()) {
            return Err(PointCloudError::InvalidIntrinsics(format!(
                "principal point must be finite, got cx={cx} cy={cy}"
            )));
        }

        let size = (info.width > 0 && info.height > 0).then(|| ImageSize {
            width: info.width as usize,
            height: info.height as usize,
        });

        Ok(Self { fx, fy, cx, cy, size })
    }
}

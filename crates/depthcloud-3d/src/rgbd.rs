use depthcloud_image::{DepthImage, Image};
use depthcloud_msgs::CameraInfo;

use crate::camera::PinholeCamera;
use crate::error::PointCloudError;
use crate::pointcloud::PointCloud;

/// Turns registered color and depth images into colored point clouds.
///
/// The camera model and the output frame are taken from a calibration
/// message, so the resulting cloud is tagged with the optical frame the
/// images were captured in.
#[derive(Debug, Clone)]
pub struct RgbdPointCloud {
    camera: PinholeCamera,
    frame_id: String,
}

impl RgbdPointCloud {
    /// Create the converter from a calibration message.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::InvalidIntrinsics`] if the calibration does
    /// not describe a pinhole camera.
    pub fn new(camera_info: &CameraInfo) -> Result<Self, PointCloudError> {
        Ok(Self {
            camera: PinholeCamera::try_from(camera_info)?,
            frame_id: camera_info.header.frame_id.clone(),
        })
    }

    /// The camera model used for back-projection.
    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    /// The frame the produced clouds are tagged with.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Back-project every pixel with a valid depth.
    ///
    /// A depth sample is valid when it is finite and strictly positive;
    /// other pixels produce no point, so the cloud holds at most
    /// `width * height` points. Colors are stored in RGB order.
    ///
    /// # Arguments
    ///
    /// * `bgr` - The color image in blue, green, red channel order.
    /// * `depth` - The depth image registered to the color image.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::SizeMismatch`] if the images differ in
    /// size or do not match the calibrated resolution.
    pub fn to_pointcloud(
        &self,
        bgr: &Image<u8, 3>,
        depth: &DepthImage,
    ) -> Result<PointCloud, PointCloudError> {
        if bgr.size() != depth.size() {
            return Err(PointCloudError::SizeMismatch {
                expected: bgr.size(),
                found: depth.size(),
            });
        }
        if let Some(calibrated) = self.camera.size {
            if calibrated != bgr.size() {
                return Err(PointCloudError::SizeMismatch {
                    expected: calibrated,
                    found: bgr.size(),
                });
            }
        }

        let depth = depth.to_meters()?;
        let capacity = bgr.size().area();
        let mut points = Vec::with_capacity(capacity);
        let mut colors = Vec::with_capacity(capacity);

        let width = bgr.width();
        for (idx, (&z, px)) in depth
            .as_slice()
            .iter()
            .zip(bgr.as_slice().chunks_exact(3))
            .enumerate()
        {
            if !(z.is_finite() && z > 0.0) {
                continue;
            }
            let (u, v) = (idx % width, idx / width);
            points.push(self.camera.unproject(u as f64, v as f64, z as f64));
            colors.push([px[2], px[1], px[0]]);
        }

        log::debug!(
            "back-projected {} of {} pixels into '{}'",
            points.len(),
            capacity,
            self.frame_id
        );

        PointCloud::new(points, Some(colors), self.frame_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use depthcloud_image::ImageSize;
    use depthcloud_msgs::{Header, Time};

    fn camera_info(width: u32, height: u32) -> CameraInfo {
        CameraInfo::from_intrinsics(
            Header::new(Time::ZERO, "head_camera_rgb_optical_frame"),
            width,
            height,
            (2.0, 2.0),
            (1.0, 1.0),
        )
    }

    #[test]
    fn test_to_pointcloud_skips_invalid_depth() -> Result<(), PointCloudError> {
        let size = ImageSize::from([2, 2]);
        let bgr = Image::<u8, 3>::new(size, vec![10, 20, 30, 0, 0, 0, 0, 0, 0, 1, 2, 3])?;
        let depth = DepthImage::Meters(Image::new(size, vec![2.0, 0.0, f32::NAN, 4.0])?);

        let converter = RgbdPointCloud::new(&camera_info(2, 2))?;
        let cloud = converter.to_pointcloud(&bgr, &depth)?;

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.frame_id(), "head_camera_rgb_optical_frame");
        assert_eq!(cloud.colors(), Some(&[[30, 20, 10], [3, 2, 1]][..]));

        // pixel (0, 0) at 2m and pixel (1, 1) at 4m
        let p0 = cloud.points()[0];
        assert_relative_eq!(p0[0], -1.0);
        assert_relative_eq!(p0[1], -1.0);
        assert_relative_eq!(p0[2], 2.0);
        assert_eq!(cloud.points()[1], [0.0, 0.0, 4.0]);
        assert!(cloud.points().iter().flatten().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_to_pointcloud_millimeters() -> Result<(), PointCloudError> {
        let size = ImageSize::from([1, 1]);
        let bgr = Image::<u8, 3>::from_size_val(size, 128)?;
        let depth = DepthImage::Millimeters(Image::new(size, vec![1500])?);

        let converter = RgbdPointCloud::new(&camera_info(0, 0))?;
        let cloud = converter.to_pointcloud(&bgr, &depth)?;
        assert_eq!(cloud.len(), 1);
        assert_relative_eq!(cloud.points()[0][2], 1.5, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_to_pointcloud_size_mismatch() -> Result<(), PointCloudError> {
        let bgr = Image::<u8, 3>::from_size_val(ImageSize::from([2, 2]), 0)?;
        let depth = DepthImage::Meters(Image::from_size_val(ImageSize::from([2, 1]), 1.0)?);
        let converter = RgbdPointCloud::new(&camera_info(2, 2))?;
        assert!(matches!(
            converter.to_pointcloud(&bgr, &depth),
            Err(PointCloudError::SizeMismatch { .. })
        ));

        let depth = DepthImage::Meters(Image::from_size_val(ImageSize::from([2, 2]), 1.0)?);
        let converter = RgbdPointCloud::new(&camera_info(4, 4))?;
        assert!(matches!(
            converter.to_pointcloud(&bgr, &depth),
            Err(PointCloudError::SizeMismatch { .. })
        ));
        Ok(())
    }
}

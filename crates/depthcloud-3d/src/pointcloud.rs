use glam::DVec3;

use crate::error::PointCloudError;
use crate::linalg::transform_points;
use crate::transforms::RigidTransform;

/// A point cloud with points, optional colors, and the frame they are expressed in.
///
/// The frame tag must always name the frame the coordinates are actually
/// expressed in; [`PointCloud::transform`] updates both together.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points, in RGB order.
    colors: Option<Vec<[u8; 3]>>,
    // The reference frame of the points.
    frame_id: String,
}

impl PointCloud {
    /// Create a new point cloud from points and colors (optional).
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::ColorCountMismatch`] if there is not one
    /// color per point.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        frame_id: impl Into<String>,
    ) -> Result<Self, PointCloudError> {
        if let Some(colors) = &colors {
            if colors.len() != points.len() {
                return Err(PointCloudError::ColorCountMismatch(colors.len(), points.len()));
            }
        }
        Ok(Self {
            points,
            colors,
            frame_id: frame_id.into(),
        })
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// The reference frame of the points.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Retag the cloud without moving the points.
    ///
    /// Only use this when the coordinates already are in `frame_id`.
    pub fn set_frame_id(&mut self, frame_id: impl Into<String>) {
        self.frame_id = frame_id.into();
    }

    /// Express the cloud in `target_frame`.
    ///
    /// # Arguments
    ///
    /// * `target_t_source` - Maps points of the current frame into the target frame.
    /// * `target_frame` - The frame tag of the result.
    pub fn transform(&mut self, target_t_source: &RigidTransform, target_frame: impl Into<String>) {
        transform_points(
            &mut self.points,
            &target_t_source.rotation_matrix(),
            &target_t_source.translation_array(),
        );
        self.frame_id = target_frame.into();
    }

    /// Get the minimum bound of the point cloud.
    pub fn min_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(|a, b| a.min(b))
            .unwrap_or(DVec3::ZERO)
    }

    /// Get the maximum bound of the point cloud.
    pub fn max_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(|a, b| a.max(b))
            .unwrap_or(DVec3::ZERO)
    }
}

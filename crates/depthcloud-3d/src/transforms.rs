use glam::{DMat3, DQuat, DVec3};

use depthcloud_msgs::{Quaternion, Transform, Vector3};

use crate::error::PointCloudError;

/// Unit axis from an arbitrary non zero vector.
fn unit_axis(axis: &[f64; 3]) -> Result<DVec3, PointCloudError> {
    DVec3::from_array(*axis).try_normalize().ok_or_else(|| {
        PointCloudError::InvalidRotation(format!("cannot rotate about the axis {axis:?}"))
    })
}

/// Rotation of `angle` radians about `axis`, as a row-major matrix.
///
/// The axis does not need to be normalized.
///
/// ```
/// use depthcloud_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rz = axis_angle_to_rotation_matrix(&[0.0, 0.0, 2.0], std::f64::consts::FRAC_PI_2).unwrap();
/// assert!((rz[1][0] - 1.0).abs() < 1e-12);
/// ```
///
/// # Errors
///
/// Returns [`PointCloudError::InvalidRotation`] for a zero or non finite axis.
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], PointCloudError> {
    let m = DMat3::from_axis_angle(unit_axis(axis)?, angle);
    Ok([m.row(0).to_array(), m.row(1).to_array(), m.row(2).to_array()])
}

/// A rotation followed by a translation.
///
/// Named by what it maps, e.g. `target_t_source` takes points expressed in
/// the source frame and expresses them in the target frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    /// Unit quaternion rotation.
    pub rotation: DQuat,
    /// Translation applied after the rotation.
    pub translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: RigidTransform = RigidTransform {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform, normalizing the rotation.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::InvalidRotation`] for a zero or non finite quaternion
    /// and [`PointCloudError::InvalidTranslation`] for a non finite translation.
    pub fn new(rotation: DQuat, translation: DVec3) -> Result<Self, PointCloudError> {
        let norm = rotation.length();
        if !(norm.is_finite() && norm > 1e-10) {
            return Err(PointCloudError::InvalidRotation(format!(
                "quaternion {rotation:?} cannot be normalized"
            )));
        }
        if !translation.is_finite() {
            return Err(PointCloudError::InvalidTranslation(format!(
                "{translation:?} is not finite"
            )));
        }
        Ok(Self {
            rotation: rotation / norm,
            translation,
        })
    }

    /// Create a transform from an (x, y, z, w) quaternion and a translation.
    pub fn from_quaternion(
        quaternion: [f64; 4],
        translation: [f64; 3],
    ) -> Result<Self, PointCloudError> {
        Self::new(
            DQuat::from_array(quaternion),
            DVec3::from_array(translation),
        )
    }

    /// Create a transform from an axis-angle rotation and a translation.
    pub fn from_axis_angle(
        axis: [f64; 3],
        angle: f64,
        translation: [f64; 3],
    ) -> Result<Self, PointCloudError> {
        Self::new(
            DQuat::from_axis_angle(unit_axis(&axis)?, angle),
            DVec3::from_array(translation),
        )
    }

    /// Create a transform from a transport message.
    pub fn from_msg(msg: &Transform) -> Result<Self, PointCloudError> {
        let Vector3 { x, y, z } = msg.translation;
        let q = msg.rotation;
        Self::from_quaternion([q.x, q.y, q.z, q.w], [x, y, z])
    }

    /// Convert into a transport message.
    pub fn to_msg(&self) -> Transform {
        let [x, y, z, w] = self.rotation.to_array();
        let [tx, ty, tz] = self.translation.to_array();
        Transform {
            translation: Vector3::new(tx, ty, tz),
            rotation: Quaternion::new(x, y, z, w),
        }
    }

    /// The transform mapping the other way.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Transform a single point.
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(point) + self.translation).to_array()
    }

    /// The rotation as a row-major 3x3 matrix.
    pub fn rotation_matrix(&self) -> [[f64; 3]; 3] {
        let m = DMat3::from_quat(self.rotation);
        [m.row(0).to_array(), m.row(1).to_array(), m.row(2).to_array()]
    }

    /// The translation as an array.
    pub fn translation_array(&self) -> [f64; 3] {
        self.translation.to_array()
    }

    /// Blend towards `other`: linear in translation, spherical in rotation.
    ///
    /// `ratio` 0 returns `self` and 1 returns `other`.
    pub fn interpolate(&self, other: &RigidTransform, ratio: f64) -> Self {
        Self {
            rotation: self.rotation.slerp(other.rotation, ratio).normalize(),
            translation: self.translation.lerp(other.translation, ratio),
        }
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = RigidTransform;

    /// Chain transforms: `(a_t_b * b_t_c)` maps frame c into frame a.
    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: (self.rotation * rhs.rotation).normalize(),
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

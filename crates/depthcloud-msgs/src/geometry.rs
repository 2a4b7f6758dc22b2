use crate::time::{Header, Stamped};

/// A vector in 3D space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

impl Vector3 {
    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A rotation quaternion in (x, y, z, w) order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
    /// w (scalar) component.
    pub w: f64,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Create a new quaternion.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A rigid transform made of a translation and a rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    /// Translation component.
    pub translation: Vector3,
    /// Rotation component.
    pub rotation: Quaternion,
}

/// The pose of `child_frame_id` expressed in `header.frame_id` at `header.stamp`.
///
/// Applying the transform to a point expressed in the child frame yields the
/// same point expressed in the parent frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformStamped {
    /// Stamp and parent frame.
    pub header: Header,
    /// The frame being located.
    pub child_frame_id: String,
    /// parent_T_child.
    pub transform: Transform,
}

impl Stamped for TransformStamped {
    fn header(&self) -> &Header {
        &self.header
    }
}

/// A batch of transforms, as broadcast on the transform topics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TfMessage {
    /// The transforms in this batch.
    pub transforms: Vec<TransformStamped>,
}

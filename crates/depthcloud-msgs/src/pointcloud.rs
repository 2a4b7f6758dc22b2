use crate::time::{Header, Stamped};

/// Scalar type of a [`PointField`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointFieldDatatype {
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
}

impl PointFieldDatatype {
    /// Size in bytes of one element.
    pub fn size(&self) -> usize {
        match self {
            PointFieldDatatype::Int8 | PointFieldDatatype::Uint8 => 1,
            PointFieldDatatype::Int16 | PointFieldDatatype::Uint16 => 2,
            PointFieldDatatype::Int32
            | PointFieldDatatype::Uint32
            | PointFieldDatatype::Float32 => 4,
            PointFieldDatatype::Float64 => 8,
        }
    }
}

/// Describes one named channel inside a packed point record.
#[derive(Clone, Debug, PartialEq)]
pub struct PointField {
    /// Name of the field, e.g. `x` or `rgb`.
    pub name: String,
    /// Byte offset from the start of the point record.
    pub offset: u32,
    /// Scalar type of the field.
    pub datatype: PointFieldDatatype,
    /// Number of elements.
    pub count: u32,
}

impl PointField {
    /// Create a single element field.
    pub fn new(name: impl Into<String>, offset: u32, datatype: PointFieldDatatype) -> Self {
        Self {
            name: name.into(),
            offset,
            datatype,
            count: 1,
        }
    }
}

/// A point cloud serialized as a packed byte buffer.
///
/// Each point occupies `point_step` bytes laid out according to `fields`.
/// Unorganized clouds have `height == 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud2 {
    /// Stamp and reference frame of the points.
    pub header: Header,
    /// Number of rows.
    pub height: u32,
    /// Number of points per row.
    pub width: u32,
    /// Layout of a single point record.
    pub fields: Vec<PointField>,
    /// Whether multi-byte fields are stored big endian.
    pub is_bigendian: bool,
    /// Size of a point record in bytes.
    pub point_step: u32,
    /// Size of a row in bytes.
    pub row_step: u32,
    /// The packed point records.
    pub data: Vec<u8>,
    /// True when no point holds invalid values.
    pub is_dense: bool,
}

impl PointCloud2 {
    /// Number of point records.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if the cloud holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&PointField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Stamped for PointCloud2 {
    fn header(&self) -> &Header {
        &self.header
    }
}

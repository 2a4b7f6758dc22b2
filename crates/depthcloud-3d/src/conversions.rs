use depthcloud_msgs::{Header, PointCloud2, PointField, PointFieldDatatype, Time};

use crate::error::PointCloudError;
use crate::pointcloud::PointCloud;
use crate::transforms::RigidTransform;

/// Byte size of a packed point record: x, y, z and a packed rgb float.
const POINT_STEP: u32 = 16;

fn read_f32(data: &[u8], offset: usize, big_endian: bool) -> Result<f32, PointCloudError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PointCloudError::Malformed(format!("no float at byte {offset}")))?;
    Ok(if big_endian {
        f32::from_be_bytes(bytes)
    } else {
        f32::from_le_bytes(bytes)
    })
}

fn write_f32(data: &mut [u8], offset: usize, value: f32, big_endian: bool) -> Result<(), PointCloudError> {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    data.get_mut(offset..offset + 4)
        .ok_or_else(|| PointCloudError::Malformed(format!("no float at byte {offset}")))?
        .copy_from_slice(&bytes);
    Ok(())
}

/// Offset of a single float32 field, or an error naming it.
fn float_field(cloud: &PointCloud2, name: &str) -> Result<usize, PointCloudError> {
    cloud
        .field(name)
        .filter(|f| f.datatype == PointFieldDatatype::Float32 && f.count == 1)
        .map(|f| f.offset as usize)
        .ok_or_else(|| PointCloudError::MissingField(name.to_string()))
}

/// Byte offsets of every point record, honoring row padding.
fn record_offsets(cloud: &PointCloud2) -> Result<Vec<usize>, PointCloudError> {
    let point_step = cloud.point_step as usize;
    let row_step = cloud.row_step as usize;
    let width = cloud.width as usize;
    let height = cloud.height as usize;

    if width > 0 && (point_step == 0 || row_step < width * point_step) {
        return Err(PointCloudError::Malformed(format!(
            "point_step {point_step} and row_step {row_step} cannot hold {width} points"
        )));
    }
    if cloud.data.len() < row_step * height {
        return Err(PointCloudError::Malformed(format!(
            "buffer holds {} bytes, expected {}",
            cloud.data.len(),
            row_step * height
        )));
    }

    Ok((0..height)
        .flat_map(|row| (0..width).map(move |col| row * row_step + col * point_step))
        .collect())
}

/// Pack RGB into the float-typed `rgb` field layout: bits 0x00RRGGBB.
fn pack_rgb([r, g, b]: [u8; 3]) -> f32 {
    f32::from_bits(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
}

fn unpack_rgb(rgb: f32) -> [u8; 3] {
    let bits = rgb.to_bits();
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}

/// Serialize a point cloud into an unorganized packed cloud.
///
/// The layout is `x y z` as float32 followed by `rgb` as a float32 holding
/// `0x00RRGGBB`, 16 bytes per point, little endian. Clouds without colors
/// carry black points.
///
/// # Arguments
///
/// * `cloud` - The point cloud to serialize.
/// * `stamp` - The acquisition time of the points.
pub fn to_point_cloud2(cloud: &PointCloud, stamp: Time) -> PointCloud2 {
    let mut data = Vec::with_capacity(cloud.len() * POINT_STEP as usize);
    let black = [0u8; 3];

    for (idx, point) in cloud.points().iter().enumerate() {
        for v in point {
            data.extend_from_slice(&(*v as f32).to_le_bytes());
        }
        let color = cloud
            .colors()
            .and_then(|colors| colors.get(idx))
            .unwrap_or(&black);
        data.extend_from_slice(&pack_rgb(*color).to_le_bytes());
    }

    PointCloud2 {
        header: Header::new(stamp, cloud.frame_id()),
        height: 1,
        width: cloud.len() as u32,
        fields: vec![
            PointField::new("x", 0, PointFieldDatatype::Float32),
            PointField::new("y", 4, PointFieldDatatype::Float32),
            PointField::new("z", 8, PointFieldDatatype::Float32),
            PointField::new("rgb", 12, PointFieldDatatype::Float32),
        ],
        is_bigendian: false,
        point_step: POINT_STEP,
        row_step: POINT_STEP * cloud.len() as u32,
        data,
        is_dense: cloud.points().iter().flatten().all(|v| v.is_finite()),
    }
}

/// Deserialize a packed cloud.
///
/// Requires float32 `x`, `y` and `z` fields. A float32 or uint32 `rgb`
/// field is read as colors when present.
///
/// # Errors
///
/// Returns [`PointCloudError::MissingField`] without coordinates and
/// [`PointCloudError::Malformed`] when the buffer is too short.
pub fn from_point_cloud2(msg: &PointCloud2) -> Result<PointCloud, PointCloudError> {
    let (fx, fy, fz) = (
        float_field(msg, "x")?,
        float_field(msg, "y")?,
        float_field(msg, "z")?,
    );
    let frgb = msg
        .field("rgb")
        .filter(|f| {
            matches!(
                f.datatype,
                PointFieldDatatype::Float32 | PointFieldDatatype::Uint32
            )
        })
        .map(|f| f.offset as usize);

    let offsets = record_offsets(msg)?;
    let mut points = Vec::with_capacity(offsets.len());
    let mut colors = Vec::with_capacity(if frgb.is_some() { offsets.len() } else { 0 });

    for base in offsets {
        let be = msg.is_bigendian;
        points.push([
            read_f32(&msg.data, base + fx, be)? as f64,
            read_f32(&msg.data, base + fy, be)? as f64,
            read_f32(&msg.data, base + fz, be)? as f64,
        ]);
        if let Some(off) = frgb {
            colors.push(unpack_rgb(read_f32(&msg.data, base + off, be)?));
        }
    }

    PointCloud::new(
        points,
        frgb.is_some().then_some(colors),
        msg.header.frame_id.clone(),
    )
}

/// Express a packed cloud in another frame.
///
/// Every point's `x`, `y` and `z` are rewritten with `target_t_source`;
/// points with non finite coordinates and all other fields are copied
/// unchanged. The result is tagged with `target_frame`.
///
/// # Errors
///
/// Returns [`PointCloudError::MissingField`] without float32 coordinates and
/// [`PointCloudError::Malformed`] when the buffer is too short.
pub fn transform_point_cloud2(
    target_frame: &str,
    target_t_source: &RigidTransform,
    input: &PointCloud2,
) -> Result<PointCloud2, PointCloudError> {
    let (fx, fy, fz) = (
        float_field(input, "x")?,
        float_field(input, "y")?,
        float_field(input, "z")?,
    );
    let offsets = record_offsets(input)?;

    let mut output = input.clone();
    output.header.frame_id = target_frame.to_string();
    let be = input.is_bigendian;

    for base in offsets {
        let p = [
            read_f32(&input.data, base + fx, be)?,
            read_f32(&input.data, base + fy, be)?,
            read_f32(&input.data, base + fz, be)?,
        ];
        if !p.iter().all(|v| v.is_finite()) {
            continue;
        }
        let [x, y, z] = target_t_source.apply(p.map(f64::from));
        write_f32(&mut output.data, base + fx, x as f32, be)?;
        write_f32(&mut output.data, base + fy, y as f32, be)?;
        write_f32(&mut output.data, base + fz, z as f32, be)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_cloud() -> Result<PointCloud, PointCloudError> {
        PointCloud::new(
            vec![[1.0, 2.0, 3.0], [-0.5, 0.25, 4.0]],
            Some(vec![[255, 128, 0], [1, 2, 3]]),
            "head_camera_rgb_optical_frame",
        )
    }

    #[test]
    fn test_to_point_cloud2_layout() -> Result<(), PointCloudError> {
        let msg = to_point_cloud2(&sample_cloud()?, Time::from_nanos(42));
        assert_eq!(msg.header.frame_id, "head_camera_rgb_optical_frame");
        assert_eq!(msg.header.stamp, Time::from_nanos(42));
        assert_eq!((msg.width, msg.height), (2, 1));
        assert_eq!(msg.data.len(), 32);
        assert_eq!(msg.row_step, 32);
        assert!(msg.is_dense);
        assert_eq!(&msg.data[16..20], &(-0.5f32).to_le_bytes());
        // rgb holds 0x00RRGGBB
        assert_eq!(&msg.data[12..16], &0x00FF8000u32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_from_point_cloud2() -> Result<(), PointCloudError> {
        let cloud = sample_cloud()?;
        let back = from_point_cloud2(&to_point_cloud2(&cloud, Time::ZERO))?;
        assert_eq!(back, cloud);
        Ok(())
    }

    #[test]
    fn test_from_point_cloud2_missing_field() -> Result<(), PointCloudError> {
        let mut msg = to_point_cloud2(&sample_cloud()?, Time::ZERO);
        msg.fields.retain(|f| f.name != "z");
        assert_eq!(
            from_point_cloud2(&msg).err(),
            Some(PointCloudError::MissingField("z".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_from_point_cloud2_truncated() -> Result<(), PointCloudError> {
        let mut msg = to_point_cloud2(&sample_cloud()?, Time::ZERO);
        msg.data.truncate(20);
        assert!(matches!(
            from_point_cloud2(&msg),
            Err(PointCloudError::Malformed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_transform_point_cloud2() -> Result<(), PointCloudError> {
        let mut cloud = sample_cloud()?;
        let msg = to_point_cloud2(&cloud, Time::from_nanos(7));
        let base_t_camera =
            RigidTransform::from_axis_angle([1.0, 0.0, 0.0], 0.3, [0.1, -0.2, 1.2])?;

        let out = transform_point_cloud2("base_link", &base_t_camera, &msg)?;
        assert_eq!(out.header.frame_id, "base_link");
        assert_eq!(out.header.stamp, msg.header.stamp);

        cloud.transform(&base_t_camera, "base_link");
        let decoded = from_point_cloud2(&out)?;
        assert_eq!(decoded.frame_id(), "base_link");
        assert_eq!(decoded.colors(), cloud.colors());
        for (a, b) in decoded.points().iter().zip(cloud.points()) {
            for i in 0..3 {
                assert_relative_eq!(a[i], b[i], epsilon = 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn test_transform_keeps_nan_points() -> Result<(), PointCloudError> {
        let cloud = PointCloud::new(vec![[f64::NAN, 0.0, 1.0]], None, "camera")?;
        let msg = to_point_cloud2(&cloud, Time::ZERO);
        assert!(!msg.is_dense);

        let shift = RigidTransform::from_quaternion([0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0])?;
        let out = transform_point_cloud2("base_link", &shift, &msg)?;
        assert_eq!(out.data, msg.data);
        Ok(())
    }
}

use glam::{DMat3, DVec3};

/// Apply `p' = R p + t` to every point in place.
///
/// # Arguments
///
/// * `points` - The points, rewritten in the destination frame.
/// * `dst_r_src` - Rotation from the source to the destination frame, row-major.
/// * `dst_t_src` - Origin of the source frame in the destination frame.
///
/// Example:
///
/// ```
/// use depthcloud_3d::linalg::transform_points;
///
/// // quarter turn about z, then one meter up
/// let mut points = vec![[1.0, 0.0, 0.0]];
/// let rz = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
/// transform_points(&mut points, &rz, &[0.0, 0.0, 1.0]);
/// assert_eq!(points, vec![[0.0, 1.0, 1.0]]);
/// ```
pub fn transform_points(points: &mut [[f64; 3]], dst_r_src: &[[f64; 3]; 3], dst_t_src: &[f64; 3]) {
    // glam stores columns, the input holds rows
    let rotation = DMat3::from_cols_array_2d(dst_r_src).transpose();
    let translation = DVec3::from_array(*dst_t_src);

    for point in points.iter_mut() {
        *point = (rotation * DVec3::from_array(*point) + translation).to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    #[test]
    fn test_translation_only() {
        let mut points = vec![[0.5, -0.5, 2.0], [0.0; 3]];
        transform_points(&mut points, &IDENTITY, &[1.0, 2.0, -3.0]);
        assert_eq!(points, vec![[1.5, 1.5, -1.0], [1.0, 2.0, -3.0]]);
    }

    #[test]
    fn test_optical_to_body_axes() {
        // camera z forward, x right, y down expressed in a body frame with
        // x forward, y left, z up
        let body_r_optical = [[0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]];
        let mut points = vec![[0.0, 0.0, 2.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        transform_points(&mut points, &body_r_optical, &[0.0; 3]);

        let expected = [[2.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];
        for (p, e) in points.iter().zip(expected) {
            for i in 0..3 {
                assert_relative_eq!(p[i], e[i]);
            }
        }
    }
}

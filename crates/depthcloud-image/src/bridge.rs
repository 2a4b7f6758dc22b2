use depthcloud_msgs::ImageMsg;

use crate::encoding::ImageEncoding;
use crate::error::ImageError;
use crate::image::{Image, ImageSize};

/// Check the message geometry and return its parsed encoding.
fn validate(msg: &ImageMsg) -> Result<ImageEncoding, ImageError> {
    let encoding = msg.encoding.parse::<ImageEncoding>()?;

    if msg.width == 0 || msg.height == 0 {
        return Err(ImageError::Malformed(format!(
            "empty image {}x{}",
            msg.width, msg.height
        )));
    }

    let row_bytes = msg.width as usize * encoding.bytes_per_pixel();
    if (msg.step as usize) < row_bytes {
        return Err(ImageError::Malformed(format!(
            "step {} is shorter than a {} row of {} bytes",
            msg.step, encoding, row_bytes
        )));
    }

    let expected = msg.step as usize * msg.height as usize;
    if msg.data.len() < expected {
        return Err(ImageError::Malformed(format!(
            "buffer holds {} bytes, expected {}",
            msg.data.len(),
            expected
        )));
    }

    Ok(encoding)
}

/// Iterate over the pixel bytes of every row, skipping the row padding.
fn rows<'a>(msg: &'a ImageMsg, encoding: ImageEncoding) -> impl Iterator<Item = &'a [u8]> + 'a {
    let row_bytes = msg.width as usize * encoding.bytes_per_pixel();
    msg.data
        .chunks(msg.step as usize)
        .take(msg.height as usize)
        .map(move |row| &row[..row_bytes])
}

fn read_u16(bytes: &[u8], big_endian: bool) -> u16 {
    let bytes = [bytes[0], bytes[1]];
    if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

fn read_f32(bytes: &[u8], big_endian: bool) -> f32 {
    let bytes = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if big_endian {
        f32::from_be_bytes(bytes)
    } else {
        f32::from_le_bytes(bytes)
    }
}

fn image_size(msg: &ImageMsg) -> ImageSize {
    ImageSize {
        width: msg.width as usize,
        height: msg.height as usize,
    }
}

/// Copy a transport image into a 3 channel 8-bit image.
///
/// # Arguments
///
/// * `msg` - The transport image. Accepted encodings are `rgb8`, `bgr8`,
///   `rgba8`, `bgra8`, `mono8` and `mono16`.
/// * `target` - The channel order of the output, [`ImageEncoding::Bgr8`] or
///   [`ImageEncoding::Rgb8`].
///
/// # Errors
///
/// Returns [`ImageError::UnsupportedEncoding`] when the source cannot be
/// converted to the target and [`ImageError::Malformed`] when the buffer
/// does not match its declared geometry.
///
/// # Examples
///
/// ```
/// use depthcloud_image::{decode_color, ImageEncoding};
/// use depthcloud_msgs::ImageMsg;
///
/// let msg = ImageMsg {
///     width: 1,
///     height: 1,
///     encoding: "rgb8".to_string(),
///     step: 3,
///     data: vec![10, 20, 30],
///     ..Default::default()
/// };
///
/// let bgr = decode_color(&msg, ImageEncoding::Bgr8).unwrap();
/// assert_eq!(bgr.as_slice(), &[30, 20, 10]);
/// ```
pub fn decode_color(msg: &ImageMsg, target: ImageEncoding) -> Result<Image<u8, 3>, ImageError> {
    let source = validate(msg)?;

    if !matches!(target, ImageEncoding::Bgr8 | ImageEncoding::Rgb8) || source.is_depth() {
        return Err(ImageError::UnsupportedEncoding(format!(
            "cannot convert {source} to {target}"
        )));
    }

    let bpp = source.bytes_per_pixel();
    let mut data = Vec::with_capacity(msg.width as usize * msg.height as usize * 3);

    for row in rows(msg, source) {
        for px in row.chunks_exact(bpp) {
            let [r, g, b] = match source {
                ImageEncoding::Rgb8 | ImageEncoding::Rgba8 => [px[0], px[1], px[2]],
                ImageEncoding::Bgr8 | ImageEncoding::Bgra8 => [px[2], px[1], px[0]],
                ImageEncoding::Mono8 => [px[0]; 3],
                ImageEncoding::Mono16 => [(read_u16(px, msg.is_bigendian) >> 8) as u8; 3],
                ImageEncoding::Depth16U | ImageEncoding::Depth32F => {
                    return Err(ImageError::UnsupportedEncoding(source.to_string()))
                }
            };
            match target {
                ImageEncoding::Rgb8 => data.extend_from_slice(&[r, g, b]),
                _ => data.extend_from_slice(&[b, g, r]),
            }
        }
    }

    Image::new(image_size(msg), data)
}

/// A decoded depth image, kept in the unit of its source encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum DepthImage {
    /// Float depth in meters, from `32FC1`.
    Meters(Image<f32, 1>),
    /// Integer depth in millimeters, from `16UC1` or `mono16`.
    Millimeters(Image<u16, 1>),
}

impl DepthImage {
    /// The size of the depth image in pixels.
    pub fn size(&self) -> ImageSize {
        match self {
            DepthImage::Meters(img) => img.size(),
            DepthImage::Millimeters(img) => img.size(),
        }
    }

    /// The encoding this image was decoded from.
    pub fn encoding(&self) -> ImageEncoding {
        match self {
            DepthImage::Meters(_) => ImageEncoding::Depth32F,
            DepthImage::Millimeters(_) => ImageEncoding::Depth16U,
        }
    }

    /// Depth in meters at column `x` and row `y`.
    ///
    /// Invalid samples (zero, NaN) are returned as they are; a zero
    /// millimeter reading stays zero.
    pub fn meters_at(&self, x: usize, y: usize) -> Option<f32> {
        match self {
            DepthImage::Meters(img) => img.get_pixel(x, y, 0).copied(),
            DepthImage::Millimeters(img) => img.get_pixel(x, y, 0).map(|&mm| mm as f32 / 1000.0),
        }
    }

    /// Convert the whole image to meters.
    pub fn to_meters(&self) -> Result<Image<f32, 1>, ImageError> {
        match self {
            DepthImage::Meters(img) => Ok(img.clone()),
            DepthImage::Millimeters(img) => {
                let meters = img.cast::<f32>()?;
                let data = meters.as_slice().iter().map(|mm| mm / 1000.0).collect();
                Image::new(img.size(), data)
            }
        }
    }
}

/// Copy a transport depth image without changing its unit.
///
/// # Errors
///
/// Returns [`ImageError::UnsupportedEncoding`] for non depth encodings and
/// [`ImageError::Malformed`] when the buffer does not match its geometry.
pub fn decode_depth(msg: &ImageMsg) -> Result<DepthImage, ImageError> {
    let source = validate(msg)?;
    let size = image_size(msg);

    match source {
        ImageEncoding::Depth32F => {
            let data = rows(msg, source)
                .flat_map(|row| row.chunks_exact(4))
                .map(|px| read_f32(px, msg.is_bigendian))
                .collect();
            Ok(DepthImage::Meters(Image::new(size, data)?))
        }
        ImageEncoding::Depth16U | ImageEncoding::Mono16 => {
            let data = rows(msg, source)
                .flat_map(|row| row.chunks_exact(2))
                .map(|px| read_u16(px, msg.is_bigendian))
                .collect();
            Ok(DepthImage::Millimeters(Image::new(size, data)?))
        }
        other => {
            log::debug!("refusing to decode {other} as depth");
            Err(ImageError::UnsupportedEncoding(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(encoding: &str, width: u32, height: u32, step: u32, data: Vec<u8>) -> ImageMsg {
        ImageMsg {
            width,
            height,
            encoding: encoding.to_string(),
            step,
            data,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_bgr_passthrough() -> Result<(), ImageError> {
        let m = msg("bgr8", 2, 1, 6, vec![1, 2, 3, 4, 5, 6]);
        let img = decode_color(&m, ImageEncoding::Bgr8)?;
        assert_eq!(img.as_slice(), &[1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn test_decode_skips_row_padding() -> Result<(), ImageError> {
        // 1 pixel wide rows padded to 4 bytes
        let m = msg("rgba8", 1, 2, 8, vec![1, 2, 3, 255, 0, 0, 0, 0, 4, 5, 6, 255, 0, 0, 0, 0]);
        let img = decode_color(&m, ImageEncoding::Bgr8)?;
        assert_eq!(img.as_slice(), &[3, 2, 1, 6, 5, 4]);
        Ok(())
    }

    #[test]
    fn test_decode_mono_to_rgb() -> Result<(), ImageError> {
        let m = msg("mono8", 2, 1, 2, vec![7, 9]);
        let img = decode_color(&m, ImageEncoding::Rgb8)?;
        assert_eq!(img.as_slice(), &[7, 7, 7, 9, 9, 9]);

        let m = msg("mono16", 1, 1, 2, vec![0x12, 0x34]);
        let img = decode_color(&m, ImageEncoding::Rgb8)?;
        assert_eq!(img.as_slice(), &[0x34, 0x34, 0x34]);
        Ok(())
    }

    #[test]
    fn test_decode_color_rejects_depth() {
        let m = msg("32FC1", 1, 1, 4, vec![0; 4]);
        assert!(matches!(
            decode_color(&m, ImageEncoding::Bgr8),
            Err(ImageError::UnsupportedEncoding(_))
        ));
        let m = msg("bgr8", 1, 1, 3, vec![0; 3]);
        assert!(matches!(
            decode_color(&m, ImageEncoding::Mono8),
            Err(ImageError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_malformed() {
        let short = msg("bgr8", 2, 2, 6, vec![0; 11]);
        assert!(matches!(
            decode_color(&short, ImageEncoding::Bgr8),
            Err(ImageError::Malformed(_))
        ));
        let narrow = msg("bgr8", 2, 1, 5, vec![0; 5]);
        assert!(matches!(
            decode_color(&narrow, ImageEncoding::Bgr8),
            Err(ImageError::Malformed(_))
        ));
        let empty = msg("32FC1", 0, 0, 0, vec![]);
        assert!(matches!(decode_depth(&empty), Err(ImageError::Malformed(_))));
        let unknown = msg("yuv422", 1, 1, 2, vec![0; 2]);
        assert!(matches!(
            decode_depth(&unknown),
            Err(ImageError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_depth_float() -> Result<(), ImageError> {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&f32::NAN.to_le_bytes());
        let m = msg("32FC1", 2, 1, 8, data);
        let depth = decode_depth(&m)?;
        assert_eq!(depth.encoding(), ImageEncoding::Depth32F);
        assert_eq!(depth.meters_at(0, 0), Some(1.5));
        assert!(depth.meters_at(1, 0).is_some_and(f32::is_nan));
        assert_eq!(depth.meters_at(2, 0), None);
        Ok(())
    }

    #[test]
    fn test_decode_depth_millimeters_big_endian() -> Result<(), ImageError> {
        let mut m = msg("16UC1", 2, 1, 4, vec![0x04, 0xB0, 0x00, 0x00]);
        m.is_bigendian = true;
        let depth = decode_depth(&m)?;
        assert_eq!(depth.encoding(), ImageEncoding::Depth16U);
        assert_eq!(depth.meters_at(0, 0), Some(1.2));
        assert_eq!(depth.meters_at(1, 0), Some(0.0));
        let meters = depth.to_meters()?;
        assert_eq!(meters.as_slice(), &[1.2, 0.0]);
        Ok(())
    }
}

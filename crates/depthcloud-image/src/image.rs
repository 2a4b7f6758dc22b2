use crate::error::ImageError;

/// Width and height of an image in pixels.
///
/// ```
/// use depthcloud_image::ImageSize;
///
/// let vga = ImageSize::from([640, 480]);
/// assert_eq!(vga.area(), 307_200);
/// assert_eq!(vga.to_string(), "640x480");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from([width, height]: [usize; 2]) -> Self {
        Self { width, height }
    }
}

/// An owned image with `CHANNELS` interleaved values per pixel, stored row by row.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const CHANNELS: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const CHANNELS: usize> Image<T, CHANNELS> {
    /// Wrap pixel data of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidChannelShape`] unless `data` holds exactly
    /// `width * height * CHANNELS` values.
    ///
    /// ```
    /// use depthcloud_image::{Image, ImageSize};
    ///
    /// let depth = Image::<f32, 1>::new(ImageSize::from([2, 1]), vec![1.5, 0.0]).unwrap();
    /// assert_eq!(depth.get_pixel(0, 0, 0), Some(&1.5));
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        if data.len() != size.area() * CHANNELS {
            return Err(ImageError::InvalidChannelShape(
                data.len(),
                size.area() * CHANNELS,
            ));
        }
        Ok(Self { size, data })
    }

    /// Create a new image with the given size filled with `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Self::new(size, vec![val; size.area() * CHANNELS])
    }

    /// The size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// The width of the image in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// The height of the image in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// The number of channels per pixel.
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// The raw pixel data.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The channels of the pixel at column `x` and row `y`.
    ///
    /// Returns `None` when the coordinates are outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[T]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let start = (y * self.size.width + x) * CHANNELS;
        self.data.get(start..start + CHANNELS)
    }

    /// A single channel value at column `x` and row `y`.
    pub fn get_pixel(&self, x: usize, y: usize, ch: usize) -> Option<&T> {
        if ch >= CHANNELS {
            return None;
        }
        self.pixel(x, y).and_then(|px| px.get(ch))
    }

    /// Convert every value to another numeric type.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::CastError`] if a value cannot be represented.
    pub fn cast<U>(&self) -> Result<Image<U, CHANNELS>, ImageError>
    where
        T: num_traits::NumCast + Copy,
        U: num_traits::NumCast,
    {
        let data = self
            .data
            .iter()
            .map(|&x| U::from(x).ok_or(ImageError::CastError))
            .collect::<Result<Vec<U>, ImageError>>()?;
        Image::new(self.size, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_new() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(ImageSize::from([2, 1]), vec![1, 2, 3, 4, 5, 6])?;
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 1);
        assert_eq!(image.pixel(1, 0), Some(&[4u8, 5, 6][..]));
        assert_eq!(image.get_pixel(0, 0, 2), Some(&3));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.get_pixel(0, 0, 3), None);
        Ok(())
    }

    #[test]
    fn test_image_shape_mismatch() {
        let res = Image::<f32, 1>::new(ImageSize::from([3, 3]), vec![0.0; 8]);
        assert_eq!(res.err(), Some(ImageError::InvalidChannelShape(8, 9)));
    }

    #[test]
    fn test_image_cast() -> Result<(), ImageError> {
        let image = Image::<u16, 1>::from_size_val(ImageSize::from([2, 2]), 1500)?;
        let image_f32 = image.cast::<f32>()?;
        assert_eq!(image_f32.as_slice(), &[1500.0; 4]);

        let too_big = Image::<u16, 1>::from_size_val(ImageSize::from([1, 1]), 300)?;
        assert_eq!(too_big.cast::<u8>().err(), Some(ImageError::CastError));
        Ok(())
    }
}

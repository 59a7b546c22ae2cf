//! # Raster images
//!
//! Owned RGBA8 pixel buffers as handed out by a rasterizer. A [`RasterImage`] is never mutated
//! once built, every operation producing pixels allocates a fresh buffer.

use std::num::NonZeroU32;

/// Straight (non-premultiplied) 8-bit RGBA.
pub type Rgba8 = [u8; 4];

pub const OPAQUE_WHITE: Rgba8 = [255, 255, 255, 255];

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionError {
    #[error("invalid dimension {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },
    #[error("buffer holds {found} elements, expected {expected}")]
    BufferLength { expected: usize, found: usize },
}

/// Width and height of a buffer. Both are always nonzero.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Dimensions {
    width: NonZeroU32,
    height: NonZeroU32,
}
impl Dimensions {
    /// # Errors
    /// [`DimensionError::InvalidDimension`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, DimensionError> {
        match (NonZeroU32::new(width), NonZeroU32::new(height)) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => Err(DimensionError::InvalidDimension { width, height }),
        }
    }
    #[must_use]
    pub const fn from_nonzero(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }
    #[must_use]
    pub fn width(self) -> u32 {
        self.width.get()
    }
    #[must_use]
    pub fn height(self) -> u32 {
        self.height.get()
    }
    /// Number of pixels covered, `width * height`.
    #[must_use]
    pub fn pixel_count(self) -> usize {
        self.width() as usize * self.height() as usize
    }
    /// Element-wise maximum of the two sizes.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
    /// The larger of the two sides.
    #[must_use]
    pub fn longest_side(self) -> u32 {
        self.width().max(self.height())
    }
}
impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An owned, immutable RGBA8 image. `pixels.len() == width * height`, row-major from the top-left.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    dimensions: Dimensions,
    pixels: Box<[Rgba8]>,
}
impl RasterImage {
    /// Wrap a pixel vector.
    /// # Errors
    /// [`DimensionError::BufferLength`] if the pixel count doesn't match the dimensions.
    pub fn new(dimensions: Dimensions, pixels: Vec<Rgba8>) -> Result<Self, DimensionError> {
        if pixels.len() == dimensions.pixel_count() {
            Ok(Self {
                dimensions,
                pixels: pixels.into_boxed_slice(),
            })
        } else {
            Err(DimensionError::BufferLength {
                expected: dimensions.pixel_count(),
                found: pixels.len(),
            })
        }
    }
    /// Build from tightly packed RGBA bytes, as produced by most image decoders.
    /// # Errors
    /// * [`DimensionError::InvalidDimension`] for a zero-sized image.
    /// * [`DimensionError::BufferLength`] if `bytes` is not exactly `width * height * 4` long.
    pub fn from_rgba_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, DimensionError> {
        let dimensions = Dimensions::new(width, height)?;
        let expected = dimensions.pixel_count() * 4;
        if bytes.len() != expected {
            return Err(DimensionError::BufferLength {
                expected,
                found: bytes.len(),
            });
        }
        // Length is a multiple of four, cast can't fail.
        let pixels: &[Rgba8] = bytemuck::cast_slice(bytes);
        Self::new(dimensions, pixels.to_vec())
    }
    /// An image of a single color.
    #[must_use]
    pub fn filled(dimensions: Dimensions, color: Rgba8) -> Self {
        Self {
            dimensions,
            pixels: vec![color; dimensions.pixel_count()].into_boxed_slice(),
        }
    }
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.width()
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.height()
    }
    #[must_use]
    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }
    /// View as packed RGBA bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
    /// Size of the pixel data, in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Rgba8>()
    }
    /// Fetch a pixel, None if out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.pixels
            .get(y as usize * self.width() as usize + x as usize)
            .copied()
    }
    /// Iterate over rows, top to bottom.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[Rgba8]> {
        self.pixels.chunks_exact(self.width() as usize)
    }
}
impl std::fmt::Debug for RasterImage {
    // Printing megabytes of pixels helps no one.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::{DimensionError, Dimensions, RasterImage};

    #[test]
    fn zero_dimensions_rejected() {
        assert_eq!(
            Dimensions::new(0, 4),
            Err(DimensionError::InvalidDimension {
                width: 0,
                height: 4
            })
        );
        assert!(Dimensions::new(4, 0).is_err());
        assert!(Dimensions::new(1, 1).is_ok());
    }
    #[test]
    fn bytes_must_match() {
        assert_eq!(
            RasterImage::from_rgba_bytes(2, 2, &[0; 15]),
            Err(DimensionError::BufferLength {
                expected: 16,
                found: 15
            })
        );
        let image = RasterImage::from_rgba_bytes(2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(image.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(image.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
    #[test]
    fn max_is_elementwise() {
        let wide = Dimensions::new(100, 50).unwrap();
        let tall = Dimensions::new(50, 100).unwrap();
        assert_eq!(wide.max(tall), Dimensions::new(100, 100).unwrap());
        assert_eq!(wide.to_string(), "100x50");
    }
}

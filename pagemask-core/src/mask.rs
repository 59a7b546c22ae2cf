//! # Mask buffers
//!
//! A single channel selector, one byte per pixel, choosing which layer shows through:
//! [`REVEAL_BOTTOM`] (0) or [`REVEAL_TOP`] (255). Painting only ever writes those two values, anything
//! in between is an artifact of imported data and is cut at [`THRESHOLD`] by the final policy.
//!
//! The mask lives at the resolution of whatever tier it is paired with. Moving between tiers always
//! goes through [`MaskBuffer::resample`], which is strictly nearest-neighbor so a hard painted edge
//! stays hard at every resolution.

use az::SaturatingAs;

use crate::raster::{DimensionError, Dimensions};

/// Mask value selecting the bottom layer.
pub const REVEAL_BOTTOM: u8 = 0;
/// Mask value selecting the top layer.
pub const REVEAL_TOP: u8 = 255;
/// Values at or above this select the top layer under the final policy.
pub const THRESHOLD: u8 = 128;

#[derive(Clone, PartialEq, Eq)]
pub struct MaskBuffer {
    dimensions: Dimensions,
    values: Box<[u8]>,
}
impl MaskBuffer {
    /// Allocate a mask filled uniformly with `fill`.
    /// # Errors
    /// [`DimensionError::InvalidDimension`] if either side is zero.
    pub fn create(width: u32, height: u32, fill: u8) -> Result<Self, DimensionError> {
        Ok(Self::filled(Dimensions::new(width, height)?, fill))
    }
    #[must_use]
    pub fn filled(dimensions: Dimensions, fill: u8) -> Self {
        Self {
            dimensions,
            values: vec![fill; dimensions.pixel_count()].into_boxed_slice(),
        }
    }
    /// Build from 8-bit luma, such as a greyscale mask image. Values are kept as-is.
    /// # Errors
    /// * [`DimensionError::InvalidDimension`] if either side is zero.
    /// * [`DimensionError::BufferLength`] if `values` is not `width * height` long.
    pub fn from_luma(width: u32, height: u32, values: Vec<u8>) -> Result<Self, DimensionError> {
        let dimensions = Dimensions::new(width, height)?;
        if values.len() != dimensions.pixel_count() {
            return Err(DimensionError::BufferLength {
                expected: dimensions.pixel_count(),
                found: values.len(),
            });
        }
        Ok(Self {
            dimensions,
            values: values.into_boxed_slice(),
        })
    }
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
    #[must_use]
    pub fn values(&self) -> &[u8] {
        &self.values
    }
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.dimensions.width() || y >= self.dimensions.height() {
            return None;
        }
        self.values
            .get(y as usize * self.dimensions.width() as usize + x as usize)
            .copied()
    }
    /// If every value is the same, returns that value.
    #[must_use]
    pub fn uniform_value(&self) -> Option<u8> {
        let (first, rest) = self.values.split_first()?;
        rest.iter().all(|v| v == first).then_some(*first)
    }
    /// Overwrite every value.
    pub fn fill(&mut self, value: u8) {
        self.values.fill(value);
    }
    /// Paint a filled disc. Every pixel whose center lies within `radius` of `(center_x, center_y)`
    /// is set to `value`. Coordinates are in this buffer's pixel space.
    ///
    /// Never fails: the part of the disc outside the buffer is clipped, and non-finite or negative
    /// input paints nothing.
    pub fn stamp(&mut self, center_x: f32, center_y: f32, radius: f32, value: u8) {
        if !(center_x.is_finite() && center_y.is_finite() && radius.is_finite()) || radius < 0.0 {
            return;
        }
        let width = self.dimensions.width();
        let height = self.dimensions.height();
        // Pixel `x` has its center at `x + 0.5`, so the covered span is
        // `center - radius <= x + 0.5 <= center + radius`.
        let min_x = (center_x - radius - 0.5).ceil();
        let max_x = (center_x + radius - 0.5).floor();
        let min_y = (center_y - radius - 0.5).ceil();
        let max_y = (center_y + radius - 0.5).floor();
        if max_x < 0.0 || max_y < 0.0 || min_x >= width as f32 || min_y >= height as f32 {
            // Entirely outside.
            return;
        }
        let min_x: u32 = min_x.max(0.0).saturating_as();
        let min_y: u32 = min_y.max(0.0).saturating_as();
        let max_x: u32 = max_x.saturating_as::<u32>().min(width - 1);
        let max_y: u32 = max_y.saturating_as::<u32>().min(height - 1);

        let radius_squared = radius * radius;
        let stride = width as usize;
        for y in min_y..=max_y {
            let dy = y as f32 + 0.5 - center_y;
            let dy_squared = dy * dy;
            if dy_squared > radius_squared {
                continue;
            }
            let row = &mut self.values[y as usize * stride..][..stride];
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center_x;
                if dx * dx + dy_squared <= radius_squared {
                    row[x as usize] = value;
                }
            }
        }
    }
    /// Nearest-neighbor resample to a new size.
    /// # Errors
    /// [`DimensionError::InvalidDimension`] if either side is zero.
    pub fn resample(&self, new_width: u32, new_height: u32) -> Result<Self, DimensionError> {
        Ok(self.resample_to(Dimensions::new(new_width, new_height)?))
    }
    /// Nearest-neighbor resample to a new size. Destination pixel `(x, y)` copies source pixel
    /// `(floor(x * src_w / dst_w), floor(y * src_h / dst_h))`. No value is ever invented, so a binary
    /// mask stays binary.
    #[must_use]
    pub fn resample_to(&self, target: Dimensions) -> Self {
        if target == self.dimensions {
            return self.clone();
        }
        let src_width = u64::from(self.dimensions.width());
        let src_height = u64::from(self.dimensions.height());
        let dst_width = u64::from(target.width());
        let dst_height = u64::from(target.height());

        // Same column lookup for every row.
        let columns: Vec<usize> = (0..dst_width)
            .map(|x| (x * src_width / dst_width) as usize)
            .collect();

        let stride = src_width as usize;
        let mut values = Vec::with_capacity(target.pixel_count());
        for y in 0..dst_height {
            let src_y = (y * src_height / dst_height) as usize;
            let src_row = &self.values[src_y * stride..][..stride];
            values.extend(columns.iter().map(|&src_x| src_row[src_x]));
        }

        Self {
            dimensions: target,
            values: values.into_boxed_slice(),
        }
    }
}
impl std::fmt::Debug for MaskBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskBuffer")
            .field("dimensions", &self.dimensions)
            .field("uniform", &self.uniform_value())
            .finish_non_exhaustive()
    }
}

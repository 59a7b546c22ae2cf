//! # Compositor
//!
//! Combines a bottom and top [`RasterImage`] through a [`MaskBuffer`] under one of two policies:
//!
//! * **Preview** - a soft, opacity-aware blend shown while editing. Neither layer ever fully vanishes,
//!   so moving the opacity slider is always a continuous change.
//! * **Final** - a hard cut at [`THRESHOLD`]. The only policy used for anything exported.
//!
//! Both are pure: inputs are untouched and a complete new buffer is returned. Rows are processed
//! in parallel, but the call only returns once every row is written.

use az::SaturatingAs;
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use crate::{
    mask::{MaskBuffer, THRESHOLD},
    raster::{Dimensions, RasterImage, Rgba8},
};

/// Weight the hidden layer keeps in the preview blend, before normalization.
/// Must stay above zero, it's what keeps both layers visible at every mask and opacity extreme.
pub const GHOST_WEIGHT: f32 = 0.15;

/// Preview opacity, 0 to 100 percent. Higher favors the top layer.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OpacityPercent(u8);
impl OpacityPercent {
    pub const MIN: Self = Self(0);
    pub const HALF: Self = Self(50);
    pub const MAX: Self = Self(100);
    /// None if above 100.
    #[must_use]
    pub fn new(percent: u8) -> Option<Self> {
        (percent <= 100).then_some(Self(percent))
    }
    /// Clamp into range.
    #[must_use]
    pub fn saturating(percent: u32) -> Self {
        Self(percent.min(100).saturating_as())
    }
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
    /// As a fraction in `[0, 1]`.
    #[must_use]
    pub fn fraction(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}
impl Default for OpacityPercent {
    fn default() -> Self {
        Self::HALF
    }
}
impl std::fmt::Display for OpacityPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Which blend rule to composite with.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Policy {
    Preview(OpacityPercent),
    Final,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeError {
    /// Layers and mask must share one size, resample the mask first.
    #[error("dimension mismatch: bottom {bottom}, top {top}, mask {mask}")]
    DimensionMismatch {
        bottom: Dimensions,
        top: Dimensions,
        mask: Dimensions,
    },
}

/// Normalized contribution of each layer to a preview pixel. Always sums to one.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PreviewWeights {
    pub bottom: f32,
    pub top: f32,
}

/// Weights of the preview blend for a given mask value.
///
/// The selected layer is weighted by `0.5 + opacity * 0.5` (top) or `0.5 + (1 - opacity) * 0.5`
/// (bottom), and the unselected one by [`GHOST_WEIGHT`]. Mask values in between interpolate.
#[must_use]
pub fn preview_weights(mask_value: u8, opacity: OpacityPercent) -> PreviewWeights {
    let mask = f32::from(mask_value) / 255.0;
    let opacity = opacity.fraction();

    let top_presence = 0.5 + opacity * 0.5;
    let bottom_presence = 0.5 + (1.0 - opacity) * 0.5;

    let top = mask * top_presence + (1.0 - mask) * GHOST_WEIGHT;
    let bottom = (1.0 - mask) * bottom_presence + mask * GHOST_WEIGHT;
    // Both terms are at least GHOST_WEIGHT * min(presence), never zero.
    let total = top + bottom;

    PreviewWeights {
        bottom: bottom / total,
        top: top / total,
    }
}

/// Soft preview blend. Alpha is forced opaque.
/// # Errors
/// [`CompositeError::DimensionMismatch`] if the three inputs differ in size.
pub fn compose_preview(
    bottom: &RasterImage,
    top: &RasterImage,
    mask: &MaskBuffer,
    opacity: OpacityPercent,
) -> Result<RasterImage, CompositeError> {
    // Only 256 possible mask values, weigh each once.
    let table: [PreviewWeights; 256] =
        std::array::from_fn(|value| preview_weights(value.saturating_as(), opacity));

    compose_with(bottom, top, mask, |b, t, m| {
        let weights = table[usize::from(m)];
        let channel = |i: usize| -> u8 {
            (f32::from(b[i]) * weights.bottom + f32::from(t[i]) * weights.top)
                .round()
                .saturating_as()
        };
        [channel(0), channel(1), channel(2), 255]
    })
}

/// Hard binary cut: mask below [`THRESHOLD`] takes the bottom pixel, otherwise the top.
/// Alpha is forced opaque.
/// # Errors
/// [`CompositeError::DimensionMismatch`] if the three inputs differ in size.
pub fn compose_final(
    bottom: &RasterImage,
    top: &RasterImage,
    mask: &MaskBuffer,
) -> Result<RasterImage, CompositeError> {
    compose_with(bottom, top, mask, |below, above, m| {
        let [r, g, b, _] = if m < THRESHOLD { below } else { above };
        [r, g, b, 255]
    })
}

/// Dispatch on a [`Policy`].
/// # Errors
/// [`CompositeError::DimensionMismatch`] if the three inputs differ in size.
pub fn compose(
    policy: Policy,
    bottom: &RasterImage,
    top: &RasterImage,
    mask: &MaskBuffer,
) -> Result<RasterImage, CompositeError> {
    match policy {
        Policy::Preview(opacity) => compose_preview(bottom, top, mask, opacity),
        Policy::Final => compose_final(bottom, top, mask),
    }
}

fn compose_with<F>(
    bottom: &RasterImage,
    top: &RasterImage,
    mask: &MaskBuffer,
    per_pixel: F,
) -> Result<RasterImage, CompositeError>
where
    F: Fn(Rgba8, Rgba8, u8) -> Rgba8 + Sync,
{
    let dimensions = mask.dimensions();
    if bottom.dimensions() != dimensions || top.dimensions() != dimensions {
        return Err(CompositeError::DimensionMismatch {
            bottom: bottom.dimensions(),
            top: top.dimensions(),
            mask: dimensions,
        });
    }

    let row_len = dimensions.width() as usize;
    let mut output = vec![[0u8; 4]; dimensions.pixel_count()];
    output
        .par_chunks_mut(row_len)
        .zip(bottom.pixels().par_chunks(row_len))
        .zip(top.pixels().par_chunks(row_len))
        .zip(mask.values().par_chunks(row_len))
        .for_each(|(((out_row, bottom_row), top_row), mask_row)| {
            for (((out, &b), &t), &m) in out_row
                .iter_mut()
                .zip(bottom_row)
                .zip(top_row)
                .zip(mask_row)
            {
                *out = per_pixel(b, t, m);
            }
        });

    // Length matches by construction.
    RasterImage::new(dimensions, output).map_err(|_| CompositeError::DimensionMismatch {
        bottom: bottom.dimensions(),
        top: top.dimensions(),
        mask: dimensions,
    })
}

#[cfg(test)]
mod test {
    use super::{
        compose, compose_final, compose_preview, preview_weights, CompositeError, OpacityPercent,
        Policy,
    };
    use crate::{
        mask::{MaskBuffer, REVEAL_BOTTOM, REVEAL_TOP},
        raster::{Dimensions, RasterImage},
    };

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RasterImage {
        RasterImage::filled(Dimensions::new(width, height).unwrap(), color)
    }

    #[test]
    fn final_all_bottom_is_bottom() {
        let bottom = solid(4, 4, RED);
        let top = solid(4, 4, BLUE);
        let mask = MaskBuffer::create(4, 4, REVEAL_BOTTOM).unwrap();
        let out = compose_final(&bottom, &top, &mask).unwrap();
        assert!(out.pixels().iter().all(|&p| p == RED));
        assert_eq!(out, bottom);
    }
    #[test]
    fn final_all_top_is_top() {
        let bottom = solid(4, 4, RED);
        let top = solid(4, 4, BLUE);
        let mask = MaskBuffer::create(4, 4, REVEAL_TOP).unwrap();
        assert_eq!(compose_final(&bottom, &top, &mask).unwrap(), top);
    }
    #[test]
    fn final_forces_opaque_and_cuts_at_threshold() {
        let bottom = solid(2, 1, [10, 20, 30, 0]);
        let top = solid(2, 1, [40, 50, 60, 7]);
        let mask = MaskBuffer::from_luma(2, 1, vec![127, 128]).unwrap();
        let out = compose_final(&bottom, &top, &mask).unwrap();
        assert_eq!(out.pixels(), &[[10, 20, 30, 255], [40, 50, 60, 255]]);
    }
    #[test]
    fn final_is_idempotent() {
        let bottom = solid(5, 3, RED);
        let top = solid(5, 3, BLUE);
        let mut mask = MaskBuffer::create(5, 3, REVEAL_TOP).unwrap();
        mask.stamp(1.0, 1.0, 1.5, REVEAL_BOTTOM);
        let once = compose_final(&bottom, &top, &mask).unwrap();

        for fill in [REVEAL_BOTTOM, REVEAL_TOP] {
            let uniform = MaskBuffer::create(5, 3, fill).unwrap();
            assert_eq!(compose_final(&once, &once, &uniform).unwrap(), once);
        }
    }
    #[test]
    fn preview_always_shows_both_layers() {
        let bottom = solid(4, 4, RED);
        let top = solid(4, 4, BLUE);
        for opacity in [OpacityPercent::MIN, OpacityPercent::HALF, OpacityPercent::MAX] {
            for fill in [REVEAL_BOTTOM, REVEAL_TOP] {
                let mask = MaskBuffer::create(4, 4, fill).unwrap();
                let out = compose_preview(&bottom, &top, &mask, opacity).unwrap();
                for &[r, g, b, a] in out.pixels() {
                    assert!(r > 0 && r < 255, "red {r} at {opacity}, mask {fill}");
                    assert!(b > 0 && b < 255, "blue {b} at {opacity}, mask {fill}");
                    assert_eq!(g, 0);
                    assert_eq!(a, 255);
                }
            }
        }
    }
    #[test]
    fn preview_favors_the_selected_layer() {
        let bottom = solid(1, 1, RED);
        let top = solid(1, 1, BLUE);
        let show_bottom = MaskBuffer::create(1, 1, REVEAL_BOTTOM).unwrap();
        let show_top = MaskBuffer::create(1, 1, REVEAL_TOP).unwrap();

        let [r, _, b, _] = compose_preview(&bottom, &top, &show_bottom, OpacityPercent::HALF)
            .unwrap()
            .pixels()[0];
        assert!(r > b);
        let [r, _, b, _] = compose_preview(&bottom, &top, &show_top, OpacityPercent::HALF)
            .unwrap()
            .pixels()[0];
        assert!(b > r);
    }
    #[test]
    fn preview_weights_are_continuous_in_opacity() {
        let mut last = preview_weights(255, OpacityPercent::MIN).top;
        for percent in 1..=100 {
            let weights = preview_weights(255, OpacityPercent::new(percent).unwrap());
            assert!((weights.top + weights.bottom - 1.0).abs() < 1e-5);
            assert!(weights.top >= last, "top weight shrank at {percent}%");
            assert!(weights.top - last < 0.02, "jump at {percent}%");
            assert!(weights.bottom > 0.0);
            last = weights.top;
        }
    }
    #[test]
    fn mismatched_dimensions() {
        let bottom = solid(4, 4, RED);
        let top = solid(4, 5, BLUE);
        let mask = MaskBuffer::create(4, 4, REVEAL_TOP).unwrap();
        assert!(matches!(
            compose(Policy::Final, &bottom, &top, &mask),
            Err(CompositeError::DimensionMismatch { .. })
        ));
        assert!(compose(Policy::Preview(OpacityPercent::HALF), &bottom, &top, &mask).is_err());
    }
    #[test]
    fn opacity_range() {
        assert_eq!(OpacityPercent::new(101), None);
        assert_eq!(OpacityPercent::saturating(250), OpacityPercent::MAX);
        assert_eq!(OpacityPercent::default().get(), 50);
        assert_eq!(OpacityPercent::HALF.to_string(), "50%");
    }
}

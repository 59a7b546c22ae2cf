//! # Resolution tiers
//!
//! Layers are rasterized at one of two [`Tier`]s: `Edit`, small enough that painting and preview stay
//! fluid, and `Output`, several times larger for export. Layers are never resampled between tiers,
//! they are re-rasterized from the source. Only the mask is carried across, by nearest-neighbor
//! [`promote_mask_to_tier`].

use std::num::NonZeroU32;

use az::SaturatingAs;

use crate::{
    compositor::{self, CompositeError, Policy},
    mask::MaskBuffer,
    raster::{Dimensions, RasterImage, Rgba8, OPAQUE_WHITE},
    units::PageSize,
};

#[derive(strum::AsRefStr, strum::EnumIter, PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Tier {
    /// Interactive painting and instant preview.
    Edit,
    /// Final export.
    Output,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum TierBoundsError {
    #[error("tier bounds must be nonzero")]
    Zero,
    #[error("output bound {output} must be at least {factor}x the edit bound {edit}")]
    OutputTooSmall { edit: u32, output: u32, factor: u32 },
    #[error("minimum page size {0}pt must be finite and positive")]
    MinPagePoints(f32),
}

/// Maximum dimension of each tier, plus the cap on how far small pages get upscaled.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TierBounds {
    edit: NonZeroU32,
    output: NonZeroU32,
    min_page_points: f32,
}
impl TierBounds {
    pub const DEFAULT_EDIT: u32 = 1200;
    pub const DEFAULT_OUTPUT: u32 = 4800;
    pub const DEFAULT_MIN_PAGE_POINTS: f32 = 200.0;
    /// Output must be at least this many times larger than edit.
    pub const OUTPUT_FACTOR: u32 = 4;

    /// # Errors
    /// * [`TierBoundsError::Zero`] if either bound is zero.
    /// * [`TierBoundsError::OutputTooSmall`] if `output < OUTPUT_FACTOR * edit`.
    /// * [`TierBoundsError::MinPagePoints`] if `min_page_points` is not finite and positive.
    pub fn new(edit: u32, output: u32, min_page_points: f32) -> Result<Self, TierBoundsError> {
        let (Some(edit_bound), Some(output_bound)) =
            (NonZeroU32::new(edit), NonZeroU32::new(output))
        else {
            return Err(TierBoundsError::Zero);
        };
        if u64::from(output) < u64::from(edit) * u64::from(Self::OUTPUT_FACTOR) {
            return Err(TierBoundsError::OutputTooSmall {
                edit,
                output,
                factor: Self::OUTPUT_FACTOR,
            });
        }
        if !min_page_points.is_finite() || min_page_points <= 0.0 {
            return Err(TierBoundsError::MinPagePoints(min_page_points));
        }
        Ok(Self {
            edit: edit_bound,
            output: output_bound,
            min_page_points,
        })
    }
    #[must_use]
    pub fn max_dimension(&self, tier: Tier) -> NonZeroU32 {
        match tier {
            Tier::Edit => self.edit,
            Tier::Output => self.output,
        }
    }
    #[must_use]
    pub fn min_page_points(&self) -> f32 {
        self.min_page_points
    }
    /// Pixels per point for a page at this tier. Fits the longer side to the tier bound, but pages
    /// smaller than `min_page_points` are only upscaled as far as a page of that size would be.
    #[must_use]
    pub fn scale_for_page(&self, tier: Tier, page: PageSize) -> f32 {
        let bound = self.max_dimension(tier).get() as f32;
        (bound / page.width_pts())
            .min(bound / page.height_pts())
            .min(bound / self.min_page_points)
    }
    /// The longest side, in pixels, to request from the rasterizer. Never exceeds the tier bound.
    #[must_use]
    pub fn target_for_page(&self, tier: Tier, page: PageSize) -> NonZeroU32 {
        let target: u32 = (page.longest_side() * self.scale_for_page(tier, page))
            .round()
            .saturating_as();
        NonZeroU32::new(target.min(self.max_dimension(tier).get())).unwrap_or(NonZeroU32::MIN)
    }
}
impl Default for TierBounds {
    fn default() -> Self {
        Self {
            edit: NonZeroU32::new(Self::DEFAULT_EDIT).unwrap_or(NonZeroU32::MIN),
            output: NonZeroU32::new(Self::DEFAULT_OUTPUT).unwrap_or(NonZeroU32::MIN),
            min_page_points: Self::DEFAULT_MIN_PAGE_POINTS,
        }
    }
}

/// Both layers of one tier, aligned onto a shared canvas.
#[derive(Clone, Debug)]
pub struct TierPair {
    tier: Tier,
    bottom: RasterImage,
    top: RasterImage,
}
impl TierPair {
    /// Place both rasters top-left on a white canvas sized to the element-wise maximum of the two,
    /// so pages of differing size never leave undefined pixels.
    #[must_use]
    pub fn align(tier: Tier, bottom: &RasterImage, top: &RasterImage) -> Self {
        let canvas = bottom.dimensions().max(top.dimensions());
        Self {
            tier,
            bottom: flatten_onto_canvas(bottom, canvas),
            top: flatten_onto_canvas(top, canvas),
        }
    }
    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        // Equal by construction.
        self.bottom.dimensions()
    }
    #[must_use]
    pub fn bottom(&self) -> &RasterImage {
        &self.bottom
    }
    #[must_use]
    pub fn top(&self) -> &RasterImage {
        &self.top
    }
    /// Composite this pair through `mask`, which must already be at this pair's dimensions.
    /// # Errors
    /// [`CompositeError::DimensionMismatch`] if the mask belongs to another tier.
    pub fn compose(
        &self,
        mask: &MaskBuffer,
        policy: Policy,
    ) -> Result<RasterImage, CompositeError> {
        compositor::compose(policy, &self.bottom, &self.top, mask)
    }
}

/// Resample a mask onto the canvas of another tier.
#[must_use]
pub fn promote_mask_to_tier(mask: &MaskBuffer, target: Dimensions) -> MaskBuffer {
    mask.resample_to(target)
}

/// Draw `image` at the top-left of an opaque white canvas. Translucent pixels are blended over
/// white, anything past the canvas edge is cropped.
#[must_use]
pub fn flatten_onto_canvas(image: &RasterImage, canvas: Dimensions) -> RasterImage {
    let canvas_width = canvas.width() as usize;
    let copy_width = image.width().min(canvas.width()) as usize;
    let copy_rows = image.height().min(canvas.height()) as usize;

    let mut pixels = vec![OPAQUE_WHITE; canvas.pixel_count()];
    for (y, source_row) in image.rows().take(copy_rows).enumerate() {
        let target_row = &mut pixels[y * canvas_width..][..copy_width];
        for (target, &source) in target_row.iter_mut().zip(source_row) {
            *target = over_white(source);
        }
    }
    RasterImage::new(canvas, pixels).unwrap_or_else(|_| RasterImage::filled(canvas, OPAQUE_WHITE))
}

/// Source-over onto opaque white, straight alpha.
fn over_white([r, g, b, a]: Rgba8) -> Rgba8 {
    if a == 255 {
        return [r, g, b, 255];
    }
    let alpha = u32::from(a);
    let white = 255 * (255 - alpha);
    // +127 to round to nearest.
    let blend = |c: u8| -> u8 { ((u32::from(c) * alpha + white + 127) / 255).saturating_as() };
    [blend(r), blend(g), blend(b), 255]
}

//! Tier-parameterized rasterization. One path serves both tiers, they differ only in the bound passed
//! to the rasterizer.

use pagemask_core::{Tier, TierBounds, TierPair};

use crate::sources::{PageRef, PageRenderError};

/// Rasterize one layer at `tier`, fitting its native page size to the tier bound.
/// # Errors
/// Forwards rasterizer failures.
pub async fn rasterize_layer_for_tier(
    layer: &PageRef,
    tier: Tier,
    bounds: &TierBounds,
) -> Result<pagemask_core::RasterImage, PageRenderError> {
    let page_size = layer.page_size()?;
    let target = bounds.target_for_page(tier, page_size);
    let raster = layer.document.render_page(layer.page, target).await?;
    log::debug!(
        "Rasterized {layer} ({page_size}) at {} tier: {} ({})",
        tier.as_ref(),
        raster.dimensions(),
        human_bytes::human_bytes(raster.byte_len() as f64),
    );
    Ok(raster)
}

/// Rasterize both layers at the same tier and align them onto a shared canvas.
/// # Errors
/// Forwards the first rasterizer failure. Nothing is produced unless both layers succeed.
pub async fn render_pair(
    bottom: &PageRef,
    top: &PageRef,
    tier: Tier,
    bounds: &TierBounds,
) -> Result<TierPair, PageRenderError> {
    let (bottom_raster, top_raster) = tokio::try_join!(
        rasterize_layer_for_tier(bottom, tier, bounds),
        rasterize_layer_for_tier(top, tier, bounds),
    )?;
    Ok(TierPair::align(tier, &bottom_raster, &top_raster))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pagemask_core::{units::Resolution, Tier, TierBounds};

    use super::{rasterize_layer_for_tier, render_pair};
    use crate::sources::{test_pages::solid_png, ImageDocument, PageNumber, PageRef};

    fn page(width: u32, height: u32, color: [u8; 4]) -> PageRef {
        let document = ImageDocument::from_encoded_pages(
            "page",
            [solid_png(width, height, color)],
            Resolution::POINTS,
        )
        .unwrap();
        PageRef::new(Arc::new(document), PageNumber::FIRST).unwrap()
    }

    #[tokio::test]
    async fn fits_tier_bound() {
        let bounds = TierBounds::new(100, 400, 20.0).unwrap();
        let layer = page(300, 150, [0, 0, 0, 255]);
        let edit = rasterize_layer_for_tier(&layer, Tier::Edit, &bounds).await.unwrap();
        assert_eq!((edit.width(), edit.height()), (100, 50));
        let output = rasterize_layer_for_tier(&layer, Tier::Output, &bounds).await.unwrap();
        assert_eq!((output.width(), output.height()), (400, 200));
    }
    #[tokio::test]
    async fn small_pages_upscale_modestly() {
        // 10pt page, scale capped at 100/20 = 5.
        let bounds = TierBounds::new(100, 400, 20.0).unwrap();
        let layer = page(10, 10, [0, 0, 0, 255]);
        let edit = rasterize_layer_for_tier(&layer, Tier::Edit, &bounds).await.unwrap();
        assert_eq!((edit.width(), edit.height()), (50, 50));
    }
    #[tokio::test]
    async fn pair_canvas_is_max_of_both() {
        let bounds = TierBounds::new(100, 400, 20.0).unwrap();
        let wide = page(200, 100, [255, 0, 0, 255]);
        let tall = page(100, 200, [0, 0, 255, 255]);
        let pair = render_pair(&wide, &tall, Tier::Edit, &bounds).await.unwrap();
        assert_eq!(pair.tier(), Tier::Edit);
        assert_eq!((pair.dimensions().width(), pair.dimensions().height()), (100, 100));
        assert!(pair
            .bottom()
            .pixels()
            .iter()
            .chain(pair.top().pixels())
            .all(|pixel| pixel[3] == 255));
    }
}

//! Raster files as pages. Each encoded image (PNG, JPEG, ...) is one page whose physical size comes
//! from its pixel size at a chosen [`Resolution`]. Only headers are read up front, full decoding is
//! deferred to [`SourceDocument::render_page`] and runs on the blocking pool.

use std::{io::Cursor, num::NonZeroU32, path::Path, sync::Arc};

use az::SaturatingAs;
use pagemask_core::{
    units::{PageSize, Resolution},
    RasterImage,
};

use super::{PageNumber, PageRenderError, SourceDocument};

#[derive(Debug)]
struct EncodedPage {
    bytes: Arc<[u8]>,
    format: image::ImageFormat,
    size: PageSize,
}

#[derive(Debug)]
pub struct ImageDocument {
    name: String,
    pages: Vec<EncodedPage>,
}
impl ImageDocument {
    /// Build a document from encoded image files, one per page. Formats are sniffed from content.
    /// # Errors
    /// * [`PageRenderError::Malformed`] if there are no pages, or a page has an unusable size.
    /// * Decode errors if a header can't be read.
    pub fn from_encoded_pages(
        name: impl Into<String>,
        pages: impl IntoIterator<Item = Vec<u8>>,
        resolution: Resolution,
    ) -> Result<Self, PageRenderError> {
        if !resolution.is_valid() {
            return Err(PageRenderError::Malformed(format!(
                "unusable resolution {resolution}"
            )));
        }
        let pages = pages
            .into_iter()
            .map(|bytes| probe(bytes, resolution))
            .collect::<Result<Vec<_>, _>>()?;
        if pages.is_empty() {
            return Err(PageRenderError::Malformed("document has no pages".to_owned()));
        }
        Ok(Self {
            name: name.into(),
            pages,
        })
    }
    /// Read each path as one page, in order. The document is named after the first path.
    /// # Errors
    /// Forwards IO errors and the errors of [`Self::from_encoded_pages`].
    pub fn open<P: AsRef<Path>>(
        paths: &[P],
        resolution: Resolution,
    ) -> Result<Self, PageRenderError> {
        let name = paths
            .first()
            .and_then(|path| path.as_ref().file_name())
            .map_or_else(|| "untitled".to_owned(), |n| n.to_string_lossy().into_owned());
        let pages = paths
            .iter()
            .map(std::fs::read)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_encoded_pages(name, pages, resolution)
    }
    fn page(&self, page: PageNumber) -> Result<&EncodedPage, PageRenderError> {
        self.pages
            .get(page.index())
            .ok_or(PageRenderError::PageOutOfRange {
                page,
                count: self.page_count(),
            })
    }
}

/// Read just enough of the header to learn format and size.
fn probe(bytes: Vec<u8>, resolution: Resolution) -> Result<EncodedPage, PageRenderError> {
    let reader = image::ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        PageRenderError::Malformed("unrecognized image format".to_owned())
    })?;
    let (width, height) = reader.into_dimensions()?;
    let size = PageSize::from_pixels(width, height, resolution).ok_or_else(|| {
        PageRenderError::Malformed(format!("page has unusable size {width}x{height}"))
    })?;
    Ok(EncodedPage {
        bytes: bytes.into(),
        format,
        size,
    })
}

/// Decode and scale so the longer side is `target` pixels.
fn decode_scaled(
    bytes: &[u8],
    format: image::ImageFormat,
    target: NonZeroU32,
) -> Result<RasterImage, PageRenderError> {
    let decoded = image::load_from_memory_with_format(bytes, format)?.into_rgba8();
    let (width, height) = decoded.dimensions();
    let longest = width.max(height);
    if longest == 0 {
        return Err(PageRenderError::Malformed("decoded an empty page".to_owned()));
    }
    let scale = target.get() as f32 / longest as f32;
    let fit = |side: u32| -> u32 { (side as f32 * scale).round().saturating_as::<u32>().max(1) };
    let (target_width, target_height) = (fit(width), fit(height));

    let scaled = if (target_width, target_height) == (width, height) {
        decoded
    } else {
        image::imageops::resize(
            &decoded,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        )
    };
    RasterImage::from_rgba_bytes(target_width, target_height, scaled.as_raw())
        .map_err(|e| PageRenderError::Malformed(e.to_string()))
}

#[async_trait::async_trait]
impl SourceDocument for ImageDocument {
    fn name(&self) -> &str {
        &self.name
    }
    fn page_count(&self) -> u32 {
        self.pages.len().saturating_as()
    }
    fn page_size(&self, page: PageNumber) -> Result<PageSize, PageRenderError> {
        Ok(self.page(page)?.size)
    }
    async fn render_page(
        &self,
        page: PageNumber,
        target_max_dimension: NonZeroU32,
    ) -> Result<RasterImage, PageRenderError> {
        let page = self.page(page)?;
        let bytes = page.bytes.clone();
        let format = page.format;
        tokio::task::spawn_blocking(move || decode_scaled(&bytes, format, target_max_dimension))
            .await?
    }
}

/// Convert into the `image` crate's buffer, for encoding to files.
#[must_use]
pub fn to_rgba_image(raster: &RasterImage) -> image::RgbaImage {
    image::RgbaImage::from_fn(raster.width(), raster.height(), |x, y| {
        image::Rgba(raster.pixel(x, y).unwrap_or_default())
    })
}

#[cfg(test)]
pub(crate) mod test {
    use std::{io::Cursor, num::NonZeroU32};

    use pagemask_core::units::Resolution;

    use super::ImageDocument;
    use crate::sources::{PageNumber, PageRenderError, SourceDocument};

    /// PNG bytes of a solid color image.
    pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn probes_page_sizes() {
        let document = ImageDocument::from_encoded_pages(
            "two pages",
            [
                solid_png(144, 72, [255, 0, 0, 255]),
                solid_png(10, 20, [0, 0, 255, 255]),
            ],
            Resolution::Dpi(144.0),
        )
        .unwrap();
        assert_eq!(document.page_count(), 2);
        let first = document.page_size(PageNumber::FIRST).unwrap();
        assert_eq!((first.width_pts(), first.height_pts()), (72.0, 36.0));
        assert!(matches!(
            document.page_size(PageNumber::new(3).unwrap()),
            Err(PageRenderError::PageOutOfRange { count: 2, .. })
        ));
    }
    #[test]
    fn rejects_garbage() {
        let result =
            ImageDocument::from_encoded_pages("junk", [vec![1, 2, 3, 4]], Resolution::POINTS);
        assert!(result.is_err());
        let empty =
            ImageDocument::from_encoded_pages("empty", Vec::<Vec<u8>>::new(), Resolution::POINTS);
        assert!(matches!(empty, Err(PageRenderError::Malformed(_))));
    }
    #[tokio::test]
    async fn renders_scaled_to_target() {
        let document = ImageDocument::from_encoded_pages(
            "wide",
            [solid_png(40, 20, [0, 255, 0, 255])],
            Resolution::POINTS,
        )
        .unwrap();
        let raster = document
            .render_page(PageNumber::FIRST, NonZeroU32::new(100).unwrap())
            .await
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (100, 50));
        assert!(raster.pixels().iter().all(|&p| p == [0, 255, 0, 255]));

        let out_of_range = document
            .render_page(PageNumber::new(2).unwrap(), NonZeroU32::new(100).unwrap())
            .await;
        assert!(out_of_range.is_err());
    }
    #[tokio::test]
    async fn truncated_data_never_renders() {
        let mut png = solid_png(32, 32, [9, 9, 9, 255]);
        png.truncate(40);
        // Depending on how far the header probe reads, this fails either at open or at render.
        if let Ok(document) = ImageDocument::from_encoded_pages("cut", [png], Resolution::POINTS) {
            let result = document
                .render_page(PageNumber::FIRST, NonZeroU32::new(64).unwrap())
                .await;
            assert!(result.is_err());
        }
    }
}

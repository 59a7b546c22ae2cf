//! # Sources
//!
//! A source is a paginated document that can be rasterized one page at a time. Rasterization is the
//! only place the compositor suspends, so it lives behind an async trait: decoders are free to move
//! their work off-thread.

mod image_document;
mod library;

pub use image_document::{to_rgba_image, ImageDocument};
pub use library::{SourceID, SourceLibrary};

#[cfg(test)]
pub(crate) use image_document::test as test_pages;

use std::{num::NonZeroU32, sync::Arc};

use pagemask_core::{units::PageSize, RasterImage};

/// 1-based page index.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PageNumber(NonZeroU32);
impl PageNumber {
    pub const FIRST: Self = Self(NonZeroU32::MIN);
    /// None for page zero.
    #[must_use]
    pub fn new(page: u32) -> Option<Self> {
        NonZeroU32::new(page).map(Self)
    }
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
    /// Offset into a zero-based page list.
    #[must_use]
    pub fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}
impl std::fmt::Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PageRenderError {
    #[error("page {page} is out of range, document has {count} pages")]
    PageOutOfRange { page: PageNumber, count: u32 },
    #[error("malformed page data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("rasterizer task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A paginated document that can be rendered to pixels.
#[async_trait::async_trait]
pub trait SourceDocument: Send + Sync + std::fmt::Debug {
    /// Human readable name, for logs.
    fn name(&self) -> &str;
    fn page_count(&self) -> u32;
    /// Native size of a page.
    /// # Errors
    /// [`PageRenderError::PageOutOfRange`] for a page past the end.
    fn page_size(&self, page: PageNumber) -> Result<PageSize, PageRenderError>;
    /// Rasterize a page, scaled so its longer side is `target_max_dimension` pixels.
    /// # Errors
    /// * [`PageRenderError::PageOutOfRange`] for a page past the end.
    /// * Any decode failure of malformed source data.
    async fn render_page(
        &self,
        page: PageNumber,
        target_max_dimension: NonZeroU32,
    ) -> Result<RasterImage, PageRenderError>;
}

/// A single page of a shared source.
#[derive(Clone, Debug)]
pub struct PageRef {
    pub document: Arc<dyn SourceDocument>,
    pub page: PageNumber,
}
impl PageRef {
    /// # Errors
    /// [`PageRenderError::PageOutOfRange`] if `page` is past the end of `document`.
    pub fn new(
        document: Arc<dyn SourceDocument>,
        page: PageNumber,
    ) -> Result<Self, PageRenderError> {
        let count = document.page_count();
        if page.get() > count {
            return Err(PageRenderError::PageOutOfRange { page, count });
        }
        Ok(Self { document, page })
    }
    /// # Errors
    /// See [`SourceDocument::page_size`]
    pub fn page_size(&self) -> Result<PageSize, PageRenderError> {
        self.document.page_size(self.page)
    }
}
impl std::fmt::Display for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} p{}", self.document.name(), self.page)
    }
}

//! # Library
//!
//! The set of opened source documents. Layers refer into the library by [`SourceID`].

use std::sync::Arc;

use pagemask_core::LocalID;

use super::{PageNumber, PageRef, PageRenderError, SourceDocument};

pub struct SourceMarker;
pub type SourceID = LocalID<SourceMarker>;

/// Opened documents, in memory.
#[derive(Default)]
pub struct SourceLibrary {
    // Only write-locked on open.
    documents: parking_lot::RwLock<hashbrown::HashMap<SourceID, Arc<dyn SourceDocument>>>,
}
impl SourceLibrary {
    /// Take ownership of a document, returning its new ID.
    pub fn insert(&self, document: Arc<dyn SourceDocument>) -> SourceID {
        let id = SourceID::default();
        log::info!(
            "Opened {} \"{}\" with {} pages",
            id,
            document.name(),
            document.page_count()
        );
        self.documents.write().insert(id, document);
        id
    }
    #[must_use]
    pub fn get(&self, id: SourceID) -> Option<Arc<dyn SourceDocument>> {
        self.documents.read().get(&id).cloned()
    }
    /// Reference a single page of an opened document.
    /// # Errors
    /// [`PageRenderError::PageOutOfRange`] if the page doesn't exist. `None` if the document doesn't.
    pub fn page(&self, id: SourceID, page: PageNumber) -> Option<Result<PageRef, PageRenderError>> {
        self.get(id).map(|document| PageRef::new(document, page))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pagemask_core::units::Resolution;

    use super::{SourceID, SourceLibrary};
    use crate::sources::{test_pages::solid_png, ImageDocument, PageNumber};

    fn document(name: &str) -> Arc<ImageDocument> {
        Arc::new(
            ImageDocument::from_encoded_pages(
                name,
                [solid_png(8, 8, [255, 0, 0, 255])],
                Resolution::POINTS,
            )
            .unwrap(),
        )
    }

    #[test]
    fn pages_of_opened_documents() {
        let library = SourceLibrary::default();
        let id = library.insert(document("red"));

        let page = library.page(id, PageNumber::FIRST).unwrap().unwrap();
        assert_eq!(page.document.name(), "red");
        assert!(library
            .page(id, PageNumber::new(2).unwrap())
            .unwrap()
            .is_err());
        // Never inserted.
        assert!(library.page(SourceID::default(), PageNumber::FIRST).is_none());
    }
    #[test]
    fn ids_are_unique() {
        let library = SourceLibrary::default();
        let first = library.insert(document("first"));
        let second = library.insert(document("second"));
        assert_ne!(first, second);
        assert_eq!(library.get(first).unwrap().name(), "first");
        assert_eq!(library.get(second).unwrap().name(), "second");
    }
}

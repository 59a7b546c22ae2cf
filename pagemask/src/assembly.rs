//! # Assembly
//!
//! Wraps a finished composite into a single-page document for export.

use std::io::Write;

use az::SaturatingAs;
use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, Stream,
};
use pagemask_core::{units::PageSize, RasterImage};

#[derive(thiserror::Error, Debug)]
pub enum DocumentBuildError {
    #[error("failed to compress image data: {0}")]
    Encode(#[from] std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialize(String),
    #[error("page size {width}x{height}pt is not finite and positive")]
    InvalidPageSize { width: f32, height: f32 },
}

/// Builds a document of one page, filled edge to edge with an image.
pub trait DocumentAssembler: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// * [`DocumentBuildError::InvalidPageSize`] if either side is not finite and positive.
    /// * Any encoding or serialization failure.
    fn build_single_image_document(
        &self,
        image: &RasterImage,
        page_width_pts: f32,
        page_height_pts: f32,
    ) -> Result<Vec<u8>, DocumentBuildError>;
}

/// Writes PDF. The image is stored as deflated 8-bit RGB, alpha is dropped as composites are always
/// opaque.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfAssembler;

const IMAGE_NAME: &[u8] = b"Im0";

impl PdfAssembler {
    fn image_stream(image: &RasterImage) -> Result<Stream, DocumentBuildError> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        for row in image.rows() {
            let rgb: Vec<u8> = row.iter().flat_map(|&[r, g, b, _]| [r, g, b]).collect();
            encoder.write_all(&rgb)?;
        }
        let compressed = encoder.finish()?;

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(image.width().into()));
        dict.set("Height", Object::Integer(image.height().into()));
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        dict.set("Length", Object::Integer(compressed.len().saturating_as()));
        Ok(Stream::new(dict, compressed))
    }
    /// Scale the unit square to the page, then paint the image into it.
    fn page_content(page: PageSize) -> Result<Vec<u8>, DocumentBuildError> {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(page.width_pts()),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(page.height_pts()),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        content
            .encode()
            .map_err(|e| DocumentBuildError::Serialize(e.to_string()))
    }
}
impl DocumentAssembler for PdfAssembler {
    fn build_single_image_document(
        &self,
        image: &RasterImage,
        page_width_pts: f32,
        page_height_pts: f32,
    ) -> Result<Vec<u8>, DocumentBuildError> {
        let page = PageSize::new(page_width_pts, page_height_pts).ok_or(
            DocumentBuildError::InvalidPageSize {
                width: page_width_pts,
                height: page_height_pts,
            },
        )?;

        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let image_id = document.add_object(Self::image_stream(image)?);
        let content_id =
            document.add_object(Stream::new(Dictionary::new(), Self::page_content(page)?));

        let mut xobjects = Dictionary::new();
        xobjects.set(IMAGE_NAME, Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width_pts()),
                Object::Real(page.height_pts()),
            ]),
        );
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Reference(content_id));
        let page_id = document.add_object(page_dict);

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        document.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = document.add_object(catalog);
        document.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|e| DocumentBuildError::Serialize(e.to_string()))?;
        log::debug!(
            "Assembled {} document for {} image on {page}",
            human_bytes::human_bytes(bytes.len() as f64),
            image.dimensions(),
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod test {
    use pagemask_core::{Dimensions, RasterImage};

    use super::{DocumentAssembler, DocumentBuildError, PdfAssembler};

    fn image() -> RasterImage {
        RasterImage::filled(Dimensions::new(6, 4).unwrap(), [10, 200, 30, 255])
    }

    #[test]
    fn builds_one_page() {
        let bytes = PdfAssembler
            .build_single_image_document(&image(), 612.0, 792.0)
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let document = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = document.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.get(&1).unwrap();
        let page = document.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = media_box[2].as_float().unwrap();
        let height = media_box[3].as_float().unwrap();
        assert_eq!((width, height), (612.0, 792.0));
    }
    #[test]
    fn image_is_rgb() {
        use std::io::Read;
        let bytes = PdfAssembler
            .build_single_image_document(&image(), 100.0, 50.0)
            .unwrap();
        let document = lopdf::Document::load_mem(&bytes).unwrap();
        let stream = document
            .objects
            .values()
            .find_map(|object| {
                let stream = object.as_stream().ok()?;
                let subtype = stream.dict.get(b"Subtype").ok()?.as_name().ok()?;
                (subtype == b"Image").then_some(stream)
            })
            .unwrap();
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 6);
        // lopdf refuses to decompress image streams itself.
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw.len(), 6 * 4 * 3);
        assert_eq!(&raw[..3], &[10, 200, 30]);
    }
    #[test]
    fn rejects_bad_page_size() {
        for (width, height) in [(0.0, 10.0), (10.0, -1.0), (f32::NAN, 10.0), (f32::INFINITY, 1.0)] {
            let result = PdfAssembler.build_single_image_document(&image(), width, height);
            assert!(
                matches!(result, Err(DocumentBuildError::InvalidPageSize { .. })),
                "{width}x{height} accepted"
            );
        }
    }
}

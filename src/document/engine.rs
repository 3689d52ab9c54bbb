use lopdf::{Document, Object, ObjectId};

use super::assemble::assemble_pages;
use super::compress::optimize_document;
use super::rasterize;
use super::{DocumentEngine, PageImage, RenderedPage};
use crate::error::DocumentError;

/// Parsed document plus its page ids in page order
pub struct LoadedDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Document engine backed by lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for LopdfEngine {
    type Document = LoadedDocument;

    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument, DocumentError> {
        let doc = Document::load_mem(bytes)?;
        // Fail now on a missing catalog rather than in every trial
        let root = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
        doc.get_object(root)?.as_dict()?;
        let pages = doc.get_pages().into_values().collect();
        Ok(LoadedDocument { doc, pages })
    }

    fn page_count(&self, doc: &LoadedDocument) -> usize {
        doc.page_count()
    }

    fn optimize(&self, doc: &LoadedDocument) -> Result<Vec<u8>, DocumentError> {
        optimize_document(&doc.doc)
    }

    fn render_page(
        &self,
        doc: &LoadedDocument,
        index: usize,
        dpi: u32,
    ) -> Result<RenderedPage, DocumentError> {
        let page_id = *doc
            .pages
            .get(index)
            .ok_or(DocumentError::MissingPage(index))?;
        rasterize::render_page(&doc.doc, page_id, dpi)
    }

    fn assemble(&self, pages: &[PageImage]) -> Result<Vec<u8>, DocumentError> {
        assemble_pages(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn page_image(width: u32, height: u32) -> PageImage {
        let engine = LopdfEngine::new();
        let rendered = RenderedPage {
            pixels: DynamicImage::ImageRgb8(RgbImage::from_pixel(
                width,
                height,
                image::Rgb([200, 30, 30]),
            )),
            width_pt: 144.0,
            height_pt: 72.0,
        };
        engine.encode_page(&rendered, 70).unwrap()
    }

    #[test]
    fn test_load_rejects_garbage() {
        let engine = LopdfEngine::new();
        assert!(engine.load(b"this is not a pdf").is_err());
        assert!(engine.load(b"").is_err());
    }

    #[test]
    fn test_assembled_document_reloads() {
        let engine = LopdfEngine::new();
        let pages = vec![page_image(20, 10), page_image(40, 20), page_image(20, 10)];
        let bytes = engine.assemble(&pages).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let loaded = engine.load(&bytes).unwrap();
        assert_eq!(engine.page_count(&loaded), 3);

        // Every page renders back at its original point size
        let rendered = engine.render_page(&loaded, 1, 72).unwrap();
        assert_eq!((rendered.width_pt, rendered.height_pt), (144.0, 72.0));
        assert!(matches!(
            engine.render_page(&loaded, 3, 72),
            Err(DocumentError::MissingPage(3))
        ));
    }

    #[test]
    fn test_optimize_keeps_pages() {
        let engine = LopdfEngine::new();
        let bytes = engine.assemble(&[page_image(16, 8)]).unwrap();
        let loaded = engine.load(&bytes).unwrap();
        let optimized = engine.optimize(&loaded).unwrap();
        let reloaded = engine.load(&optimized).unwrap();
        assert_eq!(engine.page_count(&reloaded), 1);
    }
}

//! Document engine capability: parse, render, rebuild and deflate PDFs.
//!
//! The pipeline only talks to [`DocumentEngine`]; [`LopdfEngine`] is the
//! default implementation.

pub mod assemble;
pub mod compress;
pub mod engine;
mod fonts;
pub mod rasterize;

pub use engine::LopdfEngine;

use image::DynamicImage;

use crate::codec;
use crate::error::DocumentError;

/// A page rendered to pixels, with the page size it came from
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub pixels: DynamicImage,
    /// Page width in PDF points
    pub width_pt: f32,
    /// Page height in PDF points
    pub height_pt: f32,
}

/// A page encoded as JPEG, ready to be wrapped as a full-page image
#[derive(Debug, Clone)]
pub struct PageImage {
    pub jpeg: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Single-channel JPEG
    pub gray: bool,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageImage {
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

pub trait DocumentEngine {
    /// Parsed document model
    type Document;

    fn load(&self, bytes: &[u8]) -> Result<Self::Document, DocumentError>;

    fn page_count(&self, doc: &Self::Document) -> usize;

    /// Garbage-collect unreferenced objects and deflate streams, without
    /// touching page content
    fn optimize(&self, doc: &Self::Document) -> Result<Vec<u8>, DocumentError>;

    /// Render page `index` (zero-based) at `dpi`
    fn render_page(
        &self,
        doc: &Self::Document,
        index: usize,
        dpi: u32,
    ) -> Result<RenderedPage, DocumentError>;

    /// Wrap each image as a single full-page image page and concatenate them
    /// into one deflated document
    fn assemble(&self, pages: &[PageImage]) -> Result<Vec<u8>, DocumentError>;

    /// Encode a rendered page as JPEG at `quality`
    fn encode_page(&self, page: &RenderedPage, quality: u8) -> Result<PageImage, DocumentError> {
        let jpeg = codec::encode_jpeg(&page.pixels, quality)?;
        Ok(PageImage {
            jpeg,
            pixel_width: page.pixels.width(),
            pixel_height: page.pixels.height(),
            gray: matches!(page.pixels, DynamicImage::ImageLuma8(_)),
            width_pt: page.width_pt,
            height_pt: page.height_pt,
        })
    }
}

//! Rebuild a document from page images.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::compress::save_document;
use super::PageImage;
use crate::error::DocumentError;

const PAGE_IMAGE_NAME: &str = "Im0";

/// Build a PDF with one page per image, each image filling its page.
///
/// Pages keep the point size of the page they were rendered from, so output
/// prints at the original size whatever the rasterization resolution.
pub fn assemble_pages(pages: &[PageImage]) -> Result<Vec<u8>, DocumentError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let page_id = add_image_page(&mut doc, pages_id, page)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Image streams keep their DCTDecode filter; only content streams deflate
    doc.compress();

    save_document(&mut doc)
}

/// Add one full-page image page under `parent`
fn add_image_page(
    doc: &mut Document,
    parent: ObjectId,
    page: &PageImage,
) -> Result<ObjectId, DocumentError> {
    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => page.pixel_width as i64,
            "Height" => page.pixel_height as i64,
            "ColorSpace" => if page.gray { "DeviceGray" } else { "DeviceRGB" },
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        page.jpeg.clone(),
    );
    image_stream.allows_compression = false;
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page.width_pt.into(),
                    0.into(),
                    0.into(),
                    page.height_pt.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(PAGE_IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let media_box: Vec<Object> = vec![
        0.into(),
        0.into(),
        page.width_pt.into(),
        page.height_pt.into(),
    ];
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => media_box,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                PAGE_IMAGE_NAME => image_id,
            },
        },
    });

    Ok(page_id)
}

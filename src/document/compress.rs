//! Lossless PDF size reduction
//!
//! Uses lopdf to drop unreferenced objects and compress streams, leaving
//! every page's content as it was.

use std::io::Write;

use lopdf::Document;

use crate::error::DocumentError;

/// Prune, deflate and re-save a document.
///
/// Works on a copy so the caller's model stays usable for rendering.
pub fn optimize_document(doc: &Document) -> Result<Vec<u8>, DocumentError> {
    let mut doc = doc.clone();

    let pruned = doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.renumber_objects();
    log::debug!("Pruned {} unreferenced objects", pruned.len());

    // Compress all streams
    doc.compress();

    save_document(&mut doc)
}

/// Serialize a document to bytes
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, DocumentError> {
    let mut output = Vec::new();
    write_document(doc, &mut output)?;
    Ok(output)
}

fn write_document<W: Write>(doc: &mut Document, target: &mut W) -> Result<(), DocumentError> {
    doc.save_to(target).map_err(DocumentError::Io)
}

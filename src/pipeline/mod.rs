//! Budget-driven sweeps for documents and images.
//!
//! Both pipelines visit their parameter pairs in a fixed priority order and
//! stop at the first trial that fits; otherwise they return the smallest
//! output recorded.

pub mod document;
pub mod image;

pub use document::DocumentPipeline;
pub use image::ImagePipeline;

pub mod budget;
pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod pipeline;

pub use budget::{BestTracker, Budget, TrialHook};
pub use config::{CompressionConfig, Settings};
pub use document::{DocumentEngine, LopdfEngine};
pub use error::{CodecError, ConfigError, DocumentError};
pub use model::{
    Compressed, CompressionRequest, ImageTarget, Outcome, Quality, TargetKind, Trial, TrialParams,
};
pub use pipeline::{DocumentPipeline, ImagePipeline};

/// Compress a request with the given configuration.
///
/// This is the recommended entry point for library consumers. It never
/// fails: input that cannot be decoded as the requested kind comes back as
/// [`Outcome::PassThrough`], and a budget that cannot be met yields the
/// smallest output produced.
///
/// # Example
///
/// ```no_run
/// use fit_to_size::{compress, CompressionConfig, CompressionRequest, TargetKind};
///
/// let bytes = std::fs::read("application.pdf").unwrap();
/// let request = CompressionRequest::with_default_budget(bytes, TargetKind::Document).unwrap();
/// let outcome = compress(&request, &CompressionConfig::default());
///
/// std::fs::write("application.small.pdf", outcome.bytes()).unwrap();
/// ```
pub fn compress(request: &CompressionRequest, config: &CompressionConfig) -> Outcome {
    match request.target().image_target() {
        None => DocumentPipeline::new(config).run(request.raw_bytes(), request.budget()),
        Some(target) => {
            ImagePipeline::new(config).run(request.raw_bytes(), target, request.budget())
        }
    }
}

/// Shrink a PDF under `budget` with the default tables.
///
/// Returns the input unchanged if it is not a readable PDF.
pub fn compress_document(raw_bytes: &[u8], budget: Budget) -> Vec<u8> {
    let config = CompressionConfig::default();
    DocumentPipeline::new(&config)
        .run(raw_bytes, budget)
        .into_bytes()
}

/// Shrink an image under `budget` with the default tables, as JPEG for
/// [`ImageTarget::Lossy`] or PNG for [`ImageTarget::Lossless`].
///
/// Returns the input unchanged if it is not a readable image.
pub fn compress_image(raw_bytes: &[u8], target: ImageTarget, budget: Budget) -> Vec<u8> {
    let config = CompressionConfig::default();
    ImagePipeline::new(&config)
        .run(raw_bytes, target, budget)
        .into_bytes()
}

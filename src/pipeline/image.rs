use image::DynamicImage;

use crate::budget::{BestTracker, Budget};
use crate::codec;
use crate::config::CompressionConfig;
use crate::model::{ImageTarget, Outcome, Quality, TrialParams};

/// Dimension cap, then a resize × quality sweep over one image.
pub struct ImagePipeline<'a> {
    config: &'a CompressionConfig,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(config: &'a CompressionConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, raw: &[u8], target: ImageTarget, budget: Budget) -> Outcome {
        let mut tracker = BestTracker::new(budget);
        self.run_with_tracker(raw, target, &mut tracker)
    }

    pub fn run_with_tracker(
        &self,
        raw: &[u8],
        target: ImageTarget,
        tracker: &mut BestTracker,
    ) -> Outcome {
        let decoded = match codec::decode(raw) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Input is not a readable image, passing it through: {}", e);
                return Outcome::PassThrough(raw.to_vec());
            }
        };
        log::info!(
            "Compressing {}x{} image of {} bytes to {} bytes ({:?})",
            decoded.width(),
            decoded.height(),
            raw.len(),
            tracker.budget().bytes(),
            target
        );

        let prepared = match target {
            ImageTarget::Lossy => codec::flatten(&decoded),
            ImageTarget::Lossless => decoded,
        };
        let source = match codec::cap_dimensions(prepared, self.config.max_dimension()) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Could not cap image dimensions: {}", e);
                return tracker.finalize(raw);
            }
        };

        let levels = self.quality_levels(target);
        for &factor in self.config.resize_factors() {
            // Always from the capped source, never from the previous step
            let resized;
            let buffer: &DynamicImage = if factor < 1.0 {
                match codec::scale(&source, factor) {
                    Ok(image) => {
                        resized = image;
                        &resized
                    }
                    Err(e) => {
                        log::warn!("Resize by {:.2} failed: {}", factor, e);
                        for &quality in &levels {
                            tracker.record_failure(TrialParams::Resize { factor, quality });
                        }
                        continue;
                    }
                }
            } else {
                &source
            };

            for &quality in &levels {
                if tracker.stopped() {
                    return tracker.finalize(raw);
                }
                let params = TrialParams::Resize { factor, quality };
                match codec::encode(buffer, quality) {
                    Ok(bytes) => {
                        if tracker.record(params, bytes) {
                            log::info!("Trial {} fits the budget", params);
                            return tracker.finalize(raw);
                        }
                    }
                    Err(e) => {
                        log::warn!("Trial {} failed: {}", params, e);
                        tracker.record_failure(params);
                    }
                }
            }
        }

        log::info!(
            "No trial fit the budget; returning the smallest of {} trials",
            tracker.trials().len()
        );
        tracker.finalize(raw)
    }

    /// Quality axis for `target`: the lossy table above the floor, or the
    /// single lossless level
    fn quality_levels(&self, target: ImageTarget) -> Vec<Quality> {
        match target {
            ImageTarget::Lossy => self
                .config
                .image_qualities()
                .iter()
                .filter(|&&q| q >= self.config.quality_floor())
                .map(|&q| Quality::Lossy(q))
                .collect(),
            ImageTarget::Lossless => vec![Quality::Lossless],
        }
    }
}

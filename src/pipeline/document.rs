use crate::budget::{BestTracker, Budget, SampleGate};
use crate::config::CompressionConfig;
use crate::document::{DocumentEngine, LopdfEngine, PageImage};
use crate::error::DocumentError;
use crate::model::{Outcome, TrialParams};

/// Lossless pass, then a resolution × quality rasterization sweep.
pub struct DocumentPipeline<'a, E: DocumentEngine = LopdfEngine> {
    config: &'a CompressionConfig,
    engine: E,
}

impl<'a> DocumentPipeline<'a, LopdfEngine> {
    pub fn new(config: &'a CompressionConfig) -> Self {
        Self::with_engine(config, LopdfEngine::new())
    }
}

impl<'a, E: DocumentEngine> DocumentPipeline<'a, E> {
    pub fn with_engine(config: &'a CompressionConfig, engine: E) -> Self {
        Self { config, engine }
    }

    pub fn run(&self, raw: &[u8], budget: Budget) -> Outcome {
        let mut tracker = BestTracker::new(budget);
        self.run_with_tracker(raw, &mut tracker)
    }

    /// Run the sweep against a caller-owned tracker. Its hook, if any, sees
    /// each trial as it lands and may end the sweep early.
    pub fn run_with_tracker(&self, raw: &[u8], tracker: &mut BestTracker) -> Outcome {
        let doc = match self.engine.load(raw) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Input is not a readable PDF, passing it through: {}", e);
                return Outcome::PassThrough(raw.to_vec());
            }
        };
        let page_count = self.engine.page_count(&doc);
        log::info!(
            "Compressing {}-page document of {} bytes to {} bytes",
            page_count,
            raw.len(),
            tracker.budget().bytes()
        );

        match self.engine.optimize(&doc) {
            Ok(optimized) => {
                // Re-saving can grow an already tight file; the input is
                // then the better lossless result
                let lossless = if optimized.len() < raw.len() {
                    optimized
                } else {
                    raw.to_vec()
                };
                if tracker.record(TrialParams::LosslessPass, lossless) {
                    log::info!("Lossless pass fits the budget");
                    return tracker.finalize(raw);
                }
            }
            Err(e) => {
                log::warn!("Lossless pass failed: {}", e);
                tracker.record_failure(TrialParams::LosslessPass);
            }
        }

        if page_count == 0 {
            return tracker.finalize(raw);
        }

        let gate = SampleGate::new(tracker.budget(), page_count, self.config.sample_slack());
        for (dpi, quality) in self.config.document_sweep() {
            if tracker.stopped() {
                return tracker.finalize(raw);
            }
            let params = TrialParams::Raster { dpi, quality };

            // One page rendered up front doubles as the gate sample
            let first = match self.encode_page(&doc, 0, dpi, quality) {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("Trial {} failed on page 1: {}", params, e);
                    tracker.record_failure(params);
                    continue;
                }
            };
            if let Some(gate) = gate {
                if !gate.allows(first.len()) {
                    log::debug!(
                        "Skipping {}: sample page is {} bytes, per-page budget {}",
                        params,
                        first.len(),
                        gate.per_page_budget()
                    );
                    tracker.record_skip(params);
                    continue;
                }
            }

            match self.rebuild(&doc, page_count, first, dpi, quality) {
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

        log::info!(
            "No trial fit the budget; returning the smallest of {} trials",
            tracker.trials().len()
        );
        tracker.finalize(raw)
    }

    fn encode_page(
        &self,
        doc: &E::Document,
        index: usize,
        dpi: u32,
        quality: u8,
    ) -> Result<PageImage, DocumentError> {
        let rendered = self.engine.render_page(doc, index, dpi)?;
        self.engine.encode_page(&rendered, quality)
    }

    /// Render the remaining pages and assemble them after `first`
    fn rebuild(
        &self,
        doc: &E::Document,
        page_count: usize,
        first: PageImage,
        dpi: u32,
        quality: u8,
    ) -> Result<Vec<u8>, DocumentError> {
        let mut pages = Vec::with_capacity(page_count);
        pages.push(first);
        for index in 1..page_count {
            pages.push(self.encode_page(doc, index, dpi, quality)?);
        }
        self.engine.assemble(&pages)
    }
}

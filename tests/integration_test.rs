use std::ops::ControlFlow;

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};

use fit_to_size::codec;
use fit_to_size::config::Settings;
use fit_to_size::{
    compress, compress_document, compress_image, BestTracker, Budget, CompressionConfig,
    CompressionRequest, DocumentEngine, DocumentPipeline, ImagePipeline, ImageTarget, LopdfEngine,
    Outcome, Quality, TargetKind, Trial, TrialParams,
};

/// Deterministic noise image; `seed` varies it between pages
fn noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    })
}

/// A scanned-style PDF: every page is a 2x2 inch page covered by one raw
/// RGB image. Noise keeps the lossless pass from shrinking much.
fn scanned_pdf(pages: u32, pixels: u32) -> Vec<u8> {
    scanned_pdf_with_content(pages, pixels, "q 144 0 0 144 0 0 cm /Im0 Do Q")
}

fn scanned_pdf_with_content(pages: u32, pixels: u32, content: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    for index in 0..pages {
        let image = noise_image(pixels, pixels, index);
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => pixels as i64,
                "Height" => pixels as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        ));
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.as_bytes().to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 144.into(), 144.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to save fixture PDF");
    bytes
}

fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf)
        .expect("Output should be a valid PDF")
        .get_pages()
        .len()
}

fn smallest_trial(tracker: &BestTracker) -> Option<usize> {
    tracker.trials().iter().filter_map(|t| t.size()).min()
}

#[test]
fn test_lossless_pass_satisfies_generous_budget() {
    let input = scanned_pdf(2, 64);
    let config = CompressionConfig::default();
    let pipeline = DocumentPipeline::new(&config);
    let mut tracker = BestTracker::new(Budget::from_megabytes(10.0).unwrap());

    let outcome = pipeline.run_with_tracker(&input, &mut tracker);

    // Exactly the lossless-pass output, and nothing rasterized
    let engine = LopdfEngine::new();
    let optimized = engine.optimize(&engine.load(&input).unwrap()).unwrap();
    let expected = if optimized.len() < input.len() {
        optimized
    } else {
        input.clone()
    };
    assert_eq!(outcome.bytes(), expected.as_slice());
    assert_eq!(outcome.trial(), Some(TrialParams::LosslessPass));
    assert_eq!(tracker.trials().len(), 1);
    assert_eq!(page_count(outcome.bytes()), 2);
}

#[test]
fn test_rerun_on_own_output_never_grows() {
    let input = scanned_pdf(3, 100);
    let budget = Budget::new(60_000).unwrap();

    let first = compress_document(&input, budget);
    assert!(first.len() <= budget.bytes());

    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(budget);
    let second = DocumentPipeline::new(&config).run_with_tracker(&first, &mut tracker);

    assert!(second.bytes().len() <= first.len());
    assert_eq!(tracker.trials().len(), 1);
    assert_eq!(second.trial(), Some(TrialParams::LosslessPass));
}

#[test]
fn test_sweep_returns_first_fitting_trial() {
    // About 90 KB of noise per page; lossless cannot reach 60 KB
    let input = scanned_pdf(3, 175);
    let budget = Budget::new(60_000).unwrap();
    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(budget);

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    assert!(outcome.within_budget());
    assert!(outcome.bytes().len() <= budget.bytes());
    assert!(matches!(outcome.trial(), Some(TrialParams::Raster { .. })));
    assert_eq!(page_count(outcome.bytes()), 3);

    // Every trial before the winner missed the budget, in sweep order
    let sweep: Vec<TrialParams> = std::iter::once(TrialParams::LosslessPass)
        .chain(
            config
                .document_sweep()
                .map(|(dpi, quality)| TrialParams::Raster { dpi, quality }),
        )
        .collect();
    let (winner, earlier) = tracker.trials().split_last().unwrap();
    assert_eq!(Some(winner.params), outcome.trial());
    for trial in earlier {
        assert!(trial.size().map_or(true, |size| size > budget.bytes()));
    }
    let positions: Vec<usize> = tracker
        .trials()
        .iter()
        .map(|t| sweep.iter().position(|p| *p == t.params).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_unreachable_budget_returns_smallest_trial() {
    let input = scanned_pdf(1, 48);
    let config = Settings {
        dpi_levels: vec![72, 36],
        ..Settings::default()
    }
    .validate()
    .unwrap();
    let mut tracker = BestTracker::new(Budget::new(1).unwrap());

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    assert!(!outcome.within_budget());
    assert_eq!(tracker.trials().len(), 1 + 2 * 3);
    assert_eq!(Some(outcome.bytes().len()), smallest_trial(&tracker));
}

#[test]
fn test_hook_ends_sweep_with_best_so_far() {
    let input = scanned_pdf(1, 48);
    let config = Settings {
        dpi_levels: vec![72, 36],
        ..Settings::default()
    }
    .validate()
    .unwrap();
    let mut executed = 0;
    let hook = move |_: &Trial, _: Option<usize>| {
        executed += 1;
        if executed == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let mut tracker = BestTracker::new(Budget::new(1).unwrap()).with_hook(hook);

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    assert!(tracker.stopped());
    assert_eq!(tracker.trials().len(), 3);
    assert!(!outcome.within_budget());
    assert_eq!(Some(outcome.bytes().len()), smallest_trial(&tracker));
}

#[test]
fn test_multi_page_tiny_budget_skips_by_sample() {
    let input = scanned_pdf(3, 48);
    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(Budget::new(3).unwrap());

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    // One byte per page can never be met, so no full rebuild happens
    assert_eq!(tracker.skipped().len(), config.document_sweep().count());
    assert_eq!(tracker.trials().len(), 1);
    assert_eq!(outcome.trial(), Some(TrialParams::LosslessPass));
}

/// Scanned pages with something drawn over the image must still rasterize
fn assert_overlay_pages_rasterize(overlay: &str) {
    let content = format!("q 144 0 0 144 0 0 cm /Im0 Do Q {}", overlay);
    let input = scanned_pdf_with_content(3, 175, &content);
    let budget = Budget::new(60_000).unwrap();
    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(budget);

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    assert!(outcome.within_budget());
    assert!(outcome.bytes().len() <= budget.bytes());
    assert!(matches!(outcome.trial(), Some(TrialParams::Raster { .. })));
    assert_eq!(page_count(outcome.bytes()), 3);
    assert!(tracker.trials().iter().all(|t| t.size().is_some()));
}

#[test]
fn test_text_pages_are_rasterized() {
    assert_overlay_pages_rasterize("BT /F1 10 Tf 10 10 Td (Applicant name) Tj ET");
}

#[test]
fn test_ruled_pages_are_rasterized() {
    assert_overlay_pages_rasterize("0 G 1 w 0 72 m 144 72 l S 10 20 m 60 40 70 5 130 20 c S");
}

#[test]
fn test_shaded_pages_fall_back_to_lossless_result() {
    let input = scanned_pdf_with_content(1, 16, "/Sh0 sh");
    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(Budget::new(10).unwrap());

    let outcome = DocumentPipeline::new(&config).run_with_tracker(&input, &mut tracker);

    let failed = tracker.trials().iter().filter(|t| t.size().is_none()).count();
    assert_eq!(failed, config.document_sweep().count());
    assert_eq!(outcome.trial(), Some(TrialParams::LosslessPass));
    assert_eq!(page_count(outcome.bytes()), 1);
}

#[test]
fn test_corrupted_input_passes_through() {
    let budget = Budget::new(1_000).unwrap();
    let mut corrupted = scanned_pdf(1, 16);
    corrupted.truncate(12);

    assert_eq!(compress_document(&corrupted, budget), corrupted);
    assert_eq!(compress_image(&corrupted, ImageTarget::Lossy, budget), corrupted);
    assert_eq!(
        compress_image(&corrupted, ImageTarget::Lossless, budget),
        corrupted
    );

    let garbage = b"\x00\x01\x02 definitely not a file".to_vec();
    let request = CompressionRequest::new(garbage.clone(), TargetKind::Document, budget);
    assert_eq!(
        compress(&request, &CompressionConfig::default()),
        Outcome::PassThrough(garbage)
    );
}

#[test]
fn test_large_photo_is_capped_then_swept() {
    // 4000x3000 smooth gradient under the default 2000px cap
    let photo = RgbImage::from_fn(4000, 3000, |x, y| {
        Rgb([(x * 255 / 3999) as u8, (y * 255 / 2999) as u8, 128])
    });
    let raw = codec::encode(&DynamicImage::ImageRgb8(photo), Quality::Lossy(90)).unwrap();
    let config = CompressionConfig::default();
    let budget = Budget::new(51_200).unwrap();
    let mut tracker = BestTracker::new(budget);

    let outcome =
        ImagePipeline::new(&config).run_with_tracker(&raw, ImageTarget::Lossy, &mut tracker);

    assert!(outcome.within_budget());
    assert!(outcome.bytes().len() <= budget.bytes());
    let decoded = codec::decode(outcome.bytes()).unwrap();
    let (width, height) = decoded.dimensions();
    assert!(width.max(height) <= 2000);
    assert_eq!(width * 3, height * 4);

    // Trials follow the sweep: quality inside resize, stopping at the first fit
    let mut sweep = Vec::new();
    for &factor in config.resize_factors() {
        for &q in config.image_qualities() {
            if q >= config.quality_floor() {
                sweep.push(TrialParams::Resize {
                    factor,
                    quality: Quality::Lossy(q),
                });
            }
        }
    }
    let params: Vec<TrialParams> = tracker.trials().iter().map(|t| t.params).collect();
    assert_eq!(params, sweep[..params.len()].to_vec());
    assert_eq!(params.last().copied(), outcome.trial());
    let (_, earlier) = tracker.trials().split_last().unwrap();
    assert!(earlier
        .iter()
        .all(|t| t.size().map_or(true, |size| size > budget.bytes())));
}

#[test]
fn test_signature_resize_axis_alone_decides() {
    let signature = noise_image(120, 60, 7);
    let raw = codec::encode_png(&DynamicImage::ImageRgb8(signature)).unwrap();
    // Full size is about 21 KB of PNG; 0.8 and below fit 15 KB
    let budget = Budget::new(15_000).unwrap();
    let config = CompressionConfig::default();
    let mut tracker = BestTracker::new(budget);

    let outcome = ImagePipeline::new(&config).run_with_tracker(
        &raw,
        ImageTarget::Lossless,
        &mut tracker,
    );

    for trial in tracker.trials() {
        assert!(matches!(
            trial.params,
            TrialParams::Resize {
                quality: Quality::Lossless,
                ..
            }
        ));
    }
    let factors: Vec<f32> = tracker
        .trials()
        .iter()
        .filter_map(|t| match t.params {
            TrialParams::Resize { factor, .. } => Some(factor),
            _ => None,
        })
        .collect();
    // One trial per resize step, in order, stopping at the first fit
    assert_eq!(factors, config.resize_factors()[..factors.len()].to_vec());
    assert!(outcome.within_budget());
    assert!(outcome.bytes().len() <= budget.bytes());
    assert!(codec::decode(outcome.bytes()).is_ok());
}

#[test]
fn test_compress_routes_by_target() {
    let png = codec::encode_png(&DynamicImage::ImageRgb8(noise_image(40, 40, 1))).unwrap();
    let config = CompressionConfig::default();

    let budget = Budget::new(1_000_000).unwrap();

    let photo = CompressionRequest::new(png.clone(), TargetKind::PhotoImage, budget);
    let outcome = compress(&photo, &config);
    assert!(outcome.bytes().starts_with(&[0xFF, 0xD8]));

    let signature = CompressionRequest::new(png, TargetKind::LosslessImage, budget);
    let outcome = compress(&signature, &config);
    assert!(outcome.bytes().starts_with(b"\x89PNG"));
}

//! Raster codec built on the `image` crate.
//!
//! Every function takes its input by reference and returns a fresh buffer;
//! nothing is resampled in place.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::CodecError;
use crate::model::Quality;

/// Decode any supported image format into a pixel buffer
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(CodecError::Decode)
}

/// Encode at `quality`: JPEG for lossy, PNG at maximum compression for lossless
pub fn encode(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
    match quality {
        Quality::Lossy(q) => encode_jpeg(image, q),
        Quality::Lossless => encode_png(image),
    }
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));

    // The JPEG encoder only takes 8-bit gray or RGB
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image
            .write_with_encoder(encoder)
            .map_err(CodecError::Encode)?,
        _ => flatten(image)
            .write_with_encoder(encoder)
            .map_err(CodecError::Encode)?,
    }

    Ok(bytes)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, PngFilter::Adaptive);
    image
        .write_with_encoder(encoder)
        .map_err(CodecError::Encode)?;
    Ok(bytes)
}

/// Resample to exact dimensions with a Lanczos3 filter
pub fn resample(image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage, CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    Ok(image.resize_exact(width, height, FilterType::Lanczos3))
}

/// Scale both sides by `factor`; `factor >= 1.0` returns an unchanged copy
pub fn scale(image: &DynamicImage, factor: f32) -> Result<DynamicImage, CodecError> {
    if factor >= 1.0 {
        return Ok(image.clone());
    }
    let (width, height) = image.dimensions();
    resample(
        image,
        scaled_side(width, factor),
        scaled_side(height, factor),
    )
}

/// Shrink so the longest side is at most `max_dimension`, keeping aspect ratio.
///
/// Returns the input unchanged when it already fits.
pub fn cap_dimensions(image: DynamicImage, max_dimension: u32) -> Result<DynamicImage, CodecError> {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return Ok(image);
    }

    let factor = max_dimension as f64 / longest as f64;
    let (new_width, new_height) = if width >= height {
        (max_dimension, scaled_side_f64(height, factor))
    } else {
        (scaled_side_f64(width, factor), max_dimension)
    };
    log::debug!(
        "Capping {}x{} to {}x{}",
        width,
        height,
        new_width,
        new_height
    );
    resample(&image, new_width, new_height)
}

/// Flatten alpha and palette images to opaque RGB over white
pub fn flatten(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image.clone(),
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        };
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}

pub(crate) fn scaled_side(side: u32, factor: f32) -> u32 {
    scaled_side_f64(side, f64::from(factor))
}

fn scaled_side_f64(side: u32, factor: f64) -> u32 {
    ((side as f64 * factor).round() as u32).max(1)
}

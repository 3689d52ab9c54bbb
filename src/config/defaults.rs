/// Rasterization resolutions for documents, highest first
pub const DEFAULT_DPI_LEVELS: [u32; 5] = [150, 100, 72, 50, 36];

/// JPEG qualities tried at each document resolution, highest first
pub const DEFAULT_DOCUMENT_QUALITIES: [u8; 3] = [75, 60, 45];

/// JPEG qualities tried for photos at each resize step, highest first
pub const DEFAULT_IMAGE_QUALITIES: [u8; 4] = [85, 70, 55, 40];

/// Resize factors for images, starting without resize
pub const DEFAULT_RESIZE_FACTORS: [f32; 4] = [1.0, 0.9, 0.8, 0.75];

/// Lowest JPEG quality at which scanned text and signatures stay legible
pub const DEFAULT_QUALITY_FLOOR: u8 = 40;

/// Longest image side in pixels before any sweep starts
pub const DEFAULT_MAX_DIMENSION: u32 = 2000;

/// Allowed overshoot of the per-page budget for the one-page sample
pub const DEFAULT_SAMPLE_SLACK: f32 = 1.5;

/// Budget for documents in megabytes (300 KB)
pub const DOCUMENT_MAX_MEGABYTES: f64 = 0.3;

/// Budget for photos in megabytes (50 KB)
pub const PHOTO_MAX_MEGABYTES: f64 = 0.05;

/// Budget for signatures in megabytes (50 KB)
pub const SIGNATURE_MAX_MEGABYTES: f64 = 0.05;

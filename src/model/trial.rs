use std::fmt;

/// Encoding quality for one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// JPEG quality, 1..=100
    Lossy(u8),
    /// PNG; the resize factor alone determines size
    Lossless,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Lossy(q) => write!(f, "q{}", q),
            Quality::Lossless => write!(f, "lossless"),
        }
    }
}

/// Parameters of one attempt in a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialParams {
    /// Structural garbage collection and stream deflation, no rasterization
    LosslessPass,
    /// Every page rasterized at `dpi` and stored as JPEG at `quality`
    Raster { dpi: u32, quality: u8 },
    /// Image resampled by `factor` from the capped source and encoded
    Resize { factor: f32, quality: Quality },
}

impl fmt::Display for TrialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialParams::LosslessPass => write!(f, "lossless pass"),
            TrialParams::Raster { dpi, quality } => write!(f, "{} dpi q{}", dpi, quality),
            TrialParams::Resize { factor, quality } => write!(f, "x{:.2} {}", factor, quality),
        }
    }
}

/// What happened to an executed trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialResult {
    /// Produced output of this many bytes
    Produced(usize),
    /// A capability error aborted the trial
    Failed,
}

/// An executed trial, as logged by the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub params: TrialParams,
    pub result: TrialResult,
}

impl Trial {
    pub fn size(&self) -> Option<usize> {
        match self.result {
            TrialResult::Produced(size) => Some(size),
            TrialResult::Failed => None,
        }
    }
}

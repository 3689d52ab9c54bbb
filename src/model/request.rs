use std::fmt;

use crate::budget::Budget;
use crate::config::defaults::{
    DOCUMENT_MAX_MEGABYTES, PHOTO_MAX_MEGABYTES, SIGNATURE_MAX_MEGABYTES,
};

/// Output kind requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Multi-page PDF document
    Document,
    /// Photo, encoded lossy as JPEG
    PhotoImage,
    /// Signature or line art, encoded lossless as PNG
    LosslessImage,
}

/// Encoding family for standalone images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    Lossy,
    Lossless,
}

impl TargetKind {
    /// Preset size ceiling in megabytes for this kind
    pub fn default_max_megabytes(&self) -> f64 {
        match self {
            TargetKind::Document => DOCUMENT_MAX_MEGABYTES,
            TargetKind::PhotoImage => PHOTO_MAX_MEGABYTES,
            TargetKind::LosslessImage => SIGNATURE_MAX_MEGABYTES,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            TargetKind::Document => "application/pdf",
            TargetKind::PhotoImage => "image/jpeg",
            TargetKind::LosslessImage => "image/png",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            TargetKind::Document => "pdf",
            TargetKind::PhotoImage => "jpg",
            TargetKind::LosslessImage => "png",
        }
    }

    /// Image encoding family, or None for documents
    pub fn image_target(&self) -> Option<ImageTarget> {
        match self {
            TargetKind::Document => None,
            TargetKind::PhotoImage => Some(ImageTarget::Lossy),
            TargetKind::LosslessImage => Some(ImageTarget::Lossless),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Document => "document",
            TargetKind::PhotoImage => "photo",
            TargetKind::LosslessImage => "signature",
        };
        write!(f, "{}", name)
    }
}

/// One compression call: the input, what to produce, and how big it may be
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    raw_bytes: Vec<u8>,
    target: TargetKind,
    budget: Budget,
}

impl CompressionRequest {
    pub fn new(raw_bytes: Vec<u8>, target: TargetKind, budget: Budget) -> Self {
        Self {
            raw_bytes,
            target,
            budget,
        }
    }

    /// Request using the preset budget for `target`
    pub fn with_default_budget(
        raw_bytes: Vec<u8>,
        target: TargetKind,
    ) -> Result<Self, crate::error::ConfigError> {
        let budget = Budget::from_megabytes(target.default_max_megabytes())?;
        Ok(Self::new(raw_bytes, target, budget))
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }
}

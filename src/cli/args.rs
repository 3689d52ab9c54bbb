use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::model::TargetKind;

#[derive(Parser, Debug)]
#[command(name = "fit-to-size")]
#[command(
    author,
    version,
    about = "Shrink a PDF or image until it fits under an upload size limit"
)]
pub struct Args {
    /// Input file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file path (defaults to <input>.compressed.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What to produce (inferred from the input extension when omitted)
    #[arg(short, long, value_enum)]
    pub kind: Option<Kind>,

    /// Size limit in megabytes (defaults to 0.3 for documents, 0.05 for images)
    #[arg(short = 'm', long)]
    pub max_mb: Option<f64>,

    /// Document rasterization resolutions, highest first (e.g. "150,100,72")
    #[arg(long, value_delimiter = ',')]
    pub dpi: Option<Vec<u32>>,

    /// Lowest JPEG quality the sweep may use
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality_floor: Option<u8>,

    /// Longest image side in pixels
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Allowed overshoot of the per-page budget for the sample page
    #[arg(long)]
    pub sample_slack: Option<f32>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output kind as named on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    /// Multi-page PDF
    Document,
    /// Lossy JPEG photo
    Photo,
    /// Lossless PNG signature or line art
    Signature,
}

impl From<Kind> for TargetKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Document => TargetKind::Document,
            Kind::Photo => TargetKind::PhotoImage,
            Kind::Signature => TargetKind::LosslessImage,
        }
    }
}

impl Args {
    /// Requested kind, or a guess from the input extension
    pub fn target(&self) -> TargetKind {
        match self.kind {
            Some(kind) => kind.into(),
            None => infer_target(&self.input),
        }
    }

    /// Get the output path, defaulting to the input with a `.compressed` suffix
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let extension = format!("compressed.{}", self.target().file_extension());
            self.input.with_extension(extension)
        })
    }
}

/// `.pdf` is a document, `.png` a signature, anything else a photo
pub fn infer_target(path: &Path) -> TargetKind {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => TargetKind::Document,
        Some("png") => TargetKind::LosslessImage,
        _ => TargetKind::PhotoImage,
    }
}

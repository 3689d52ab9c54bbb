pub mod outcome;
pub mod request;
pub mod trial;

pub use outcome::{Compressed, Outcome};
pub use request::{CompressionRequest, ImageTarget, TargetKind};
pub use trial::{Quality, Trial, TrialParams, TrialResult};

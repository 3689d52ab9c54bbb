pub mod args;

pub use args::{infer_target, Args, Kind};

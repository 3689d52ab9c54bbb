pub mod raster;

pub use raster::{
    cap_dimensions, decode, encode, encode_jpeg, encode_png, flatten, resample, scale,
};

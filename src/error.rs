use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    #[error("Empty table: {0}")]
    EmptyTable(&'static str),

    #[error("Table {0} must be strictly descending")]
    NotDescending(&'static str),

    #[error("Quality {quality} is outside 1..=100 or below the floor of {floor}")]
    QualityOutOfRange { quality: u8, floor: u8 },

    #[error("Invalid resize factor {0}: must be in (0, 1]")]
    InvalidResizeFactor(f32),

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Page {0} does not exist")]
    MissingPage(usize),

    #[error("Unsupported page content: {0}")]
    UnsupportedContent(String),

    #[error("Page too large to render: {width}x{height} pixels")]
    RenderTooLarge { width: u32, height: u32 },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

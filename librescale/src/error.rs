use thiserror::Error;

/// Result type for rescale operations
pub type Result<T> = std::result::Result<T, RescaleError>;

/// Errors that can occur while rescaling an image
#[derive(Error, Debug)]
pub enum RescaleError {
    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("No frames found in the input file: {path}")]
    EmptyInput { path: String },

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image library error: {0}")]
    Image(#[from] image::ImageError),
}

impl RescaleError {
    /// Pipeline stage the error belongs to, used in diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Decode(_) | Self::EmptyInput { .. } => "decode",
            Self::Transform(_) => "transform",
            Self::Encode(_) => "encode",
            Self::Io(_) => "io",
            Self::Image(_) => "codec",
        }
    }
}

/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// The encoding tag is unknown or cannot be converted as requested.
    #[error("Unsupported image encoding: {0}")]
    UnsupportedEncoding(String),

    /// The buffer does not describe a valid image.
    #[error("Malformed image buffer: {0}")]
    Malformed(String),

    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when a pixel value cannot be represented in the target type.
    #[error("Failed to cast image data")]
    CastError,
}

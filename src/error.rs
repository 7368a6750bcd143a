//! error handling stuff
use thiserror::Error;

#[derive(Debug, Error)]
/// An error
pub enum LayeraError {
    /// an IO error
    #[error("i/o error: {0}")]
    IO(#[from] std::io::Error),

    /// a reqwest error
    #[error("network error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// the server answered with a non-2xx status
    #[error("server responded with {status} for {url}")]
    Status {
        /// the http status code
        status: u16,
        /// the url that was requested
        url: String,
    },

    /// the chunked upload session protocol was violated
    #[error("upload session error: {0}")]
    Session(String),

    /// a json error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// a value that isn't a usable css color
    #[error("invalid color value: {0}")]
    InvalidColor(String),

    /// a value that can't be written as a css property value
    #[error("invalid css value: {0}")]
    InvalidValue(String),

    /// a preset id that isn't registered
    #[error("unknown theme preset: {0}")]
    UnknownPreset(String),

    /// a header name or value that can't be sent
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// an image decoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// a blocking task was cancelled or panicked
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// a url parse error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// shorthand result for layera operations
pub type Result<T> = std::result::Result<T, LayeraError>;

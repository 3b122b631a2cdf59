//! Error types for disc-image access

use thiserror::Error;

/// The main error type for disc-image operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying file or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening an image failed (bad path, unrecognized format, or both the
    /// container and the raw-image fallback were rejected)
    #[error("Open failed: {0}")]
    Open(String),

    /// Container metadata is missing or malformed
    #[error("Invalid container metadata: {0}")]
    Metadata(String),

    /// Operation on a closed image handle
    #[error("Image is not open")]
    NotOpen,

    /// Block or sector address beyond the TOC/geometry bounds
    #[error("Address out of range: {0}")]
    OutOfRange(String),

    /// Requested sector format cannot be derived from the stored encoding
    #[error("Unsupported sector conversion: {0}")]
    UnsupportedConversion(String),

    /// Write attempted on a read-only image
    #[error("Write denied: image is read-only")]
    WriteDenied,

    /// Subcode requested on a track with no stored subchannel data
    #[error("No subcode data stored for this track")]
    NoSubcode,

    /// Unsupported format or feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result type alias for disc-image operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an open error
    pub fn open(msg: impl Into<String>) -> Self {
        Error::Open(msg.into())
    }

    /// Create a metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Error::Metadata(msg.into())
    }

    /// Create an out-of-range error
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Error::OutOfRange(msg.into())
    }

    /// Create an unsupported-conversion error
    pub fn unsupported_conversion(msg: impl Into<String>) -> Self {
        Error::UnsupportedConversion(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }
}

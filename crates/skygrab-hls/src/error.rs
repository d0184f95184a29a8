//! Error types for skygrab-hls.

use thiserror::Error;

/// Result type for skygrab-hls operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for playlist parsing and variant resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested resolution did not split into exactly two non-empty
    /// components on `x`.
    #[error("invalid resolution format: {0:?} (expected WxH)")]
    InvalidResolutionFormat(String),

    /// No variant in the master manifest matched the requested resolution.
    #[error("resolution {0} not found in master playlist")]
    ResolutionNotFound(String),

    /// The master manifest yielded no variant descriptors at all.
    #[error("master playlist contains no variant streams")]
    NoVariants,

    /// The media manifest yielded no segment references.
    #[error("media playlist contains no segments")]
    NoSegments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidResolutionFormat("1280".to_string());
        assert_eq!(
            err.to_string(),
            "invalid resolution format: \"1280\" (expected WxH)"
        );

        let err = Error::ResolutionNotFound("1920x1080".to_string());
        assert_eq!(
            err.to_string(),
            "resolution 1920x1080 not found in master playlist"
        );
    }
}

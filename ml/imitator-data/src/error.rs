//! Error types for imitator-data crate.

use thiserror::Error;

/// Errors that can occur while providing face batches.
#[derive(Debug, Error)]
pub enum DataError {
    /// Batch or sample has the wrong dimensionality.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    /// Requested split holds no samples.
    #[error("split {0} is empty")]
    EmptySplit(String),

    /// Invalid provider configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Image decode or encode failure.
    #[error("image error at {path}: {reason}")]
    Image {
        /// Path of the image file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DataError {
    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an empty split error.
    #[must_use]
    pub fn empty_split(split: impl Into<String>) -> Self {
        Self::EmptySplit(split.into())
    }

    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates an image error.
    #[must_use]
    pub fn image(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Image {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization(reason.into())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for imitator-data operations.
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_shape_mismatch() {
        let err = DataError::shape_mismatch("95", "94");
        assert!(err.to_string().contains("95"));
        assert!(err.to_string().contains("94"));
    }

    #[test]
    fn error_empty_split() {
        let err = DataError::empty_split("test");
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn error_image() {
        let err = DataError::image("faces/a.png", "truncated");
        assert!(err.to_string().contains("faces/a.png"));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn error_invalid_config() {
        let err = DataError::invalid_config("image_size must be > 0");
        assert!(err.to_string().contains("image_size"));
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: DataError = io_err.into();
        assert!(matches!(err, DataError::Io(_)));
    }

    #[test]
    fn error_from_serde_error() {
        let parsed: std::result::Result<Vec<u8>, _> = serde_json::from_str("{");
        let err: DataError = match parsed {
            Ok(_) => DataError::serialization("unexpected success"),
            Err(e) => e.into(),
        };
        assert!(matches!(err, DataError::Serialization(_)));
    }
}

//! Error types for imitator-training crate.

use imitator_data::DataError;
use imitator_model::ModelError;
use thiserror::Error;

/// Errors that can occur during training, checkpointing or evaluation.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Parameter or reference tensor has the wrong dimensionality.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    /// Checkpoint directory or file could not be created, written or read.
    #[error("IO error: {0}")]
    Io(String),

    /// Checkpoint structure does not match the current network or optimizer.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Requested accelerator is not available.
    #[error("accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    /// Invalid training configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset provider failure.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Metrics sink failure.
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl TrainingError {
    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }

    /// Creates a deserialization error.
    #[must_use]
    pub fn deserialization(reason: impl Into<String>) -> Self {
        Self::Deserialization(reason.into())
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates a dataset error.
    #[must_use]
    pub fn dataset(reason: impl Into<String>) -> Self {
        Self::Dataset(reason.into())
    }

    /// Creates a metrics error.
    #[must_use]
    pub fn metrics(reason: impl Into<String>) -> Self {
        Self::Metrics(reason.into())
    }
}

impl From<std::io::Error> for TrainingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TrainingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for TrainingError {
    fn from(err: image::ImageError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<DataError> for TrainingError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::ShapeMismatch { expected, actual } => Self::ShapeMismatch { expected, actual },
            other => Self::Dataset(other.to_string()),
        }
    }
}

impl From<ModelError> for TrainingError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ShapeMismatch { expected, actual } => Self::ShapeMismatch { expected, actual },
            ModelError::AcceleratorUnavailable(reason) => Self::AcceleratorUnavailable(reason),
            ModelError::InvalidConfig(reason) => Self::InvalidConfig(reason),
            err @ (ModelError::Deserialization { .. } | ModelError::UnsupportedFormat(_)) => {
                Self::Deserialization(err.to_string())
            }
            err @ (ModelError::SaveCheckpoint { .. }
            | ModelError::CheckpointNotFound(_)
            | ModelError::Io(_)) => Self::Io(err.to_string()),
        }
    }
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert!(
            TrainingError::invalid_config("batch_size must be > 0")
                .to_string()
                .contains("invalid configuration")
        );
        assert!(TrainingError::io("disk full").to_string().contains("IO error"));
        assert!(
            TrainingError::deserialization("missing field")
                .to_string()
                .contains("deserialization")
        );
        assert!(TrainingError::metrics("closed").to_string().contains("metrics"));
        assert!(TrainingError::dataset("empty").to_string().contains("dataset"));
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: TrainingError = io_err.into();
        assert!(matches!(err, TrainingError::Io(_)));
    }

    #[test]
    fn model_errors_keep_their_kind() {
        let err: TrainingError = ModelError::shape_mismatch("[1, 95]", "[1, 3]").into();
        assert!(matches!(err, TrainingError::ShapeMismatch { .. }));

        let err: TrainingError = ModelError::deserialization("a.bin", "bad").into();
        assert!(matches!(err, TrainingError::Deserialization(_)));

        let err: TrainingError = ModelError::accelerator_unavailable("wgpu").into();
        assert!(matches!(err, TrainingError::AcceleratorUnavailable(_)));

        let err: TrainingError = ModelError::checkpoint_not_found("a.bin").into();
        assert!(matches!(err, TrainingError::Io(_)));

        let err: TrainingError = ModelError::save_checkpoint("a.bin", "denied").into();
        assert!(matches!(err, TrainingError::Io(_)));
    }

    #[test]
    fn data_errors_keep_shape_kind() {
        let err: TrainingError = DataError::shape_mismatch("95", "94").into();
        assert!(matches!(err, TrainingError::ShapeMismatch { .. }));

        let err: TrainingError = DataError::empty_split("test").into();
        assert!(matches!(err, TrainingError::Dataset(_)));
    }
}

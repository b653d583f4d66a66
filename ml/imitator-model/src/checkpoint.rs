//! Checkpoint file naming and record persistence.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{
    BinFileRecorder, FullPrecisionSettings, PrettyJsonFileRecorder, Record, Recorder,
    RecorderError,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, Result};
use crate::network::ImitatorNetwork;

/// File stem prefix of training checkpoints.
pub const CHECKPOINT_PREFIX: &str = "model_imitator_";

/// Supported checkpoint file formats.
///
/// # Example
///
/// ```
/// use imitator_model::CheckpointFormat;
///
/// let format = CheckpointFormat::from_extension("bin");
/// assert_eq!(format, Some(CheckpointFormat::Binary));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckpointFormat {
    /// Burn `BinFileRecorder`, full precision.
    #[default]
    Binary,

    /// Burn `PrettyJsonFileRecorder`, for inspection.
    Json,
}

impl CheckpointFormat {
    /// Determines format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "bin" => Some(Self::Binary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Determines format from file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "bin",
            Self::Json => "json",
        }
    }

    /// Returns the format name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for CheckpointFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Returns `<model_dir>/model_imitator_<step+1>.<ext>`.
#[must_use]
pub fn checkpoint_path(model_dir: &Path, step: usize, format: CheckpointFormat) -> PathBuf {
    model_dir.join(format!(
        "{CHECKPOINT_PREFIX}{}.{}",
        step + 1,
        format.extension()
    ))
}

/// Parses the `step + 1` suffix back out of a checkpoint file name.
#[must_use]
pub fn checkpoint_number(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(CHECKPOINT_PREFIX)?
        .parse()
        .ok()
}

/// Writes any Burn record to `path` in the given format.
///
/// The extension of `path` is replaced by the format's extension.
///
/// # Errors
///
/// Returns [`ModelError::SaveCheckpoint`] if the recorder fails.
pub fn save_record<B, R>(record: R, path: &Path, format: CheckpointFormat) -> Result<PathBuf>
where
    B: Backend,
    R: Record<B>,
{
    let full_path = path.with_extension(format.extension());
    let result = match format {
        CheckpointFormat::Binary => Recorder::<B>::record(
            &BinFileRecorder::<FullPrecisionSettings>::new(),
            record,
            full_path.clone(),
        ),
        CheckpointFormat::Json => Recorder::<B>::record(
            &PrettyJsonFileRecorder::<FullPrecisionSettings>::new(),
            record,
            full_path.clone(),
        ),
    };
    result.map_err(|e| {
        ModelError::save_checkpoint(full_path.display().to_string(), e.to_string())
    })?;
    Ok(full_path)
}

/// Reads a Burn record from `path`, picking the recorder by extension.
///
/// # Errors
///
/// - [`ModelError::CheckpointNotFound`] if the file does not exist
/// - [`ModelError::UnsupportedFormat`] if the extension is unknown
/// - [`ModelError::Deserialization`] if the stored structure does not match `R`
pub fn load_record<B, R>(path: &Path, device: &B::Device) -> Result<R>
where
    B: Backend,
    R: Record<B>,
{
    let display = path.display().to_string();
    if !path.exists() {
        return Err(ModelError::checkpoint_not_found(display));
    }
    let format =
        CheckpointFormat::from_path(path).ok_or_else(|| ModelError::unsupported_format(&display))?;

    let result = match format {
        CheckpointFormat::Binary => Recorder::<B>::load(
            &BinFileRecorder::<FullPrecisionSettings>::new(),
            path.to_path_buf(),
            device,
        ),
        CheckpointFormat::Json => Recorder::<B>::load(
            &PrettyJsonFileRecorder::<FullPrecisionSettings>::new(),
            path.to_path_buf(),
            device,
        ),
    };
    result.map_err(|e| match e {
        RecorderError::FileNotFound(reason) => ModelError::checkpoint_not_found(reason),
        other => ModelError::deserialization(display, other.to_string()),
    })
}

/// Exports the network weights alone, e.g. for a downstream consumer.
///
/// # Errors
///
/// Returns [`ModelError::SaveCheckpoint`] if writing fails.
pub fn save_network<B: Backend>(
    network: &ImitatorNetwork<B>,
    path: &Path,
    format: CheckpointFormat,
) -> Result<PathBuf> {
    let full_path = save_record::<B, _>(network.clone().into_record(), path, format)?;
    info!(path = %full_path.display(), %format, "Saved network weights");
    Ok(full_path)
}

/// Loads exported weights into `network`.
///
/// # Errors
///
/// See [`load_record`].
pub fn load_network<B: Backend>(
    network: ImitatorNetwork<B>,
    path: &Path,
    device: &B::Device,
) -> Result<ImitatorNetwork<B>> {
    let record = load_record::<B, _>(path, device)?;
    let network = network.load_checked(record, &path.display().to_string())?;
    info!(path = %path.display(), "Loaded network weights");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImitatorConfig, Mode};
    use burn::tensor::{Distribution, Tensor};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn small() -> ImitatorConfig {
        ImitatorConfig::default()
            .with_channels(vec![4, 4])
            .with_residual_units(1)
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            CheckpointFormat::from_extension("BIN"),
            Some(CheckpointFormat::Binary)
        );
        assert_eq!(
            CheckpointFormat::from_extension("json"),
            Some(CheckpointFormat::Json)
        );
        assert_eq!(CheckpointFormat::from_extension("pth"), None);
        assert_eq!(CheckpointFormat::from_extension("burn"), None);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model_imitator_5.bin")),
            Some(CheckpointFormat::Binary)
        );
        assert_eq!(CheckpointFormat::from_path(Path::new("model")), None);
    }

    #[test]
    fn format_display() {
        assert_eq!(format!("{}", CheckpointFormat::Binary), "binary");
        assert_eq!(format!("{}", CheckpointFormat::Json), "json");
    }

    #[test]
    fn path_uses_next_step_number() {
        let path = checkpoint_path(Path::new("out"), 4, CheckpointFormat::Binary);
        assert_eq!(path, Path::new("out").join("model_imitator_5.bin"));
        assert_eq!(checkpoint_number(&path), Some(5));
        assert_eq!(checkpoint_number(Path::new("out/preview.bin")), None);
    }

    #[test]
    fn load_missing_file() {
        let device = <TestBackend as Backend>::Device::default();
        let model = ImitatorNetwork::<TestBackend>::new(&small(), &device)
            .unwrap_or_else(|e| panic!("{e}"));
        let result = load_network(model, Path::new("/nonexistent/model_imitator_1.bin"), &device);
        assert!(matches!(result, Err(ModelError::CheckpointNotFound(_))));
    }

    #[test]
    fn load_unknown_extension() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("weights.pth");
        std::fs::write(&path, b"not a record").unwrap_or_else(|e| panic!("{e}"));

        let device = <TestBackend as Backend>::Device::default();
        let model = ImitatorNetwork::<TestBackend>::new(&small(), &device)
            .unwrap_or_else(|e| panic!("{e}"));
        let result = load_network(model, &path, &device);
        assert!(matches!(result, Err(ModelError::UnsupportedFormat(_))));
    }

    #[test]
    fn network_round_trip_both_formats() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));

        for format in [CheckpointFormat::Binary, CheckpointFormat::Json] {
            let model = ImitatorNetwork::<TestBackend>::new(&small(), &device)
                .unwrap_or_else(|e| panic!("{e}"));
            let params =
                Tensor::<TestBackend, 2>::random([2, 95], Distribution::Uniform(0.0, 1.0), &device);
            let before = model
                .forward(params.clone(), Mode::Eval)
                .unwrap_or_else(|e| panic!("{e}"));

            let path = save_network(&model, &dir.path().join("weights"), format)
                .unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(CheckpointFormat::from_path(&path), Some(format));

            let fresh = ImitatorNetwork::<TestBackend>::new(&small(), &device)
                .unwrap_or_else(|e| panic!("{e}"));
            let restored = load_network(fresh, &path, &device).unwrap_or_else(|e| panic!("{e}"));
            let after = restored
                .forward(params, Mode::Eval)
                .unwrap_or_else(|e| panic!("{e}"));

            let diff: f32 = (before - after).abs().max().into_scalar();
            assert!(diff < 1e-6, "{format}: {diff}");
        }
    }

    #[test]
    fn load_mismatched_widths() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let model = ImitatorNetwork::<TestBackend>::new(&small(), &device)
            .unwrap_or_else(|e| panic!("{e}"));
        let path = save_network(&model, &dir.path().join("weights"), CheckpointFormat::Binary)
            .unwrap_or_else(|e| panic!("{e}"));

        let wider = small().with_channels(vec![8, 4]);
        let other = ImitatorNetwork::<TestBackend>::new(&wider, &device)
            .unwrap_or_else(|e| panic!("{e}"));
        let result = load_network(other, &path, &device);
        assert!(matches!(result, Err(ModelError::Deserialization { .. })));
    }

    #[test]
    fn load_corrupt_record() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("weights.json");
        std::fs::write(&path, "{\"unexpected\": true}").unwrap_or_else(|e| panic!("{e}"));

        let model = ImitatorNetwork::<TestBackend>::new(&small(), &device)
            .unwrap_or_else(|e| panic!("{e}"));
        let result = load_network(model, &path, &device);
        assert!(matches!(result, Err(ModelError::Deserialization { .. })));
    }
}

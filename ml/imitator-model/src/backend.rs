//! Backend selection.

use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, Result};

/// Supported Burn backends.
///
/// # Example
///
/// ```
/// use imitator_model::BackendType;
///
/// let backend = BackendType::select(false);
/// assert!(matches!(backend, Ok(BackendType::NdArray)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BackendType {
    /// CPU backend using ndarray. Always available.
    #[default]
    NdArray,

    /// GPU backend using WGPU; requires the `wgpu` feature.
    Wgpu,
}

impl BackendType {
    /// Returns `true` if this is a CPU backend.
    #[must_use]
    pub const fn is_cpu(&self) -> bool {
        matches!(self, Self::NdArray)
    }

    /// Returns `true` if this is an accelerator backend.
    #[must_use]
    pub const fn is_gpu(&self) -> bool {
        matches!(self, Self::Wgpu)
    }

    /// Returns the backend name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NdArray => "ndarray",
            Self::Wgpu => "wgpu",
        }
    }

    /// Returns `true` if this backend was compiled into the build.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        match self {
            Self::NdArray => true,
            Self::Wgpu => cfg!(feature = "wgpu"),
        }
    }

    /// Fails unless this backend is available.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AcceleratorUnavailable`] for a missing backend.
    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ModelError::accelerator_unavailable(format!(
                "{} backend not compiled in; rebuild with `--features {}` or run without acceleration",
                self.name(),
                self.name()
            )))
        }
    }

    /// Picks the backend for a run.
    ///
    /// Requesting acceleration never falls back to the CPU silently.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AcceleratorUnavailable`] if acceleration was
    /// requested and no accelerator backend is available.
    pub fn select(use_accelerator: bool) -> Result<Self> {
        let backend = if use_accelerator {
            Self::Wgpu
        } else {
            Self::NdArray
        };
        backend.ensure_available()?;
        info!(backend = backend.name(), "Selected backend");
        Ok(backend)
    }

    /// Classifies the Burn backend `B` by the name it reports.
    #[must_use]
    pub fn of<B: Backend>() -> Self {
        if B::name().to_lowercase().contains("wgpu") {
            Self::Wgpu
        } else {
            Self::NdArray
        }
    }

    /// Picks the backend for a run on `B`, which is fixed at compile time.
    ///
    /// Returns the backend `B` actually runs on.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AcceleratorUnavailable`] if acceleration was
    /// requested and either no accelerator is compiled in or `B` is not one.
    pub fn select_for<B: Backend>(use_accelerator: bool) -> Result<Self> {
        let requested = Self::select(use_accelerator)?;
        let running = Self::of::<B>();
        if requested.is_gpu() && !running.is_gpu() {
            return Err(ModelError::accelerator_unavailable(format!(
                "{requested} requested but the model runs on {}",
                B::name()
            )));
        }
        Ok(running)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    #[test]
    fn backend_type_default() {
        assert_eq!(BackendType::default(), BackendType::NdArray);
    }

    #[test]
    fn backend_type_flags() {
        assert!(BackendType::NdArray.is_cpu());
        assert!(!BackendType::NdArray.is_gpu());
        assert!(BackendType::Wgpu.is_gpu());
        assert!(BackendType::NdArray.is_available());
    }

    #[test]
    fn backend_type_display() {
        assert_eq!(format!("{}", BackendType::NdArray), "ndarray");
        assert_eq!(format!("{}", BackendType::Wgpu), "wgpu");
    }

    #[test]
    fn select_cpu() {
        assert!(matches!(BackendType::select(false), Ok(BackendType::NdArray)));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn select_accelerator_without_feature_fails() {
        assert!(matches!(
            BackendType::select(true),
            Err(ModelError::AcceleratorUnavailable(_))
        ));
    }

    #[test]
    fn backend_of_cpu_backends() {
        assert_eq!(BackendType::of::<NdArray<f32>>(), BackendType::NdArray);
        assert_eq!(
            BackendType::of::<Autodiff<NdArray<f32>>>(),
            BackendType::NdArray
        );
    }

    #[test]
    fn select_for_cpu_backend() {
        assert!(matches!(
            BackendType::select_for::<NdArray<f32>>(false),
            Ok(BackendType::NdArray)
        ));
        assert!(matches!(
            BackendType::select_for::<Autodiff<NdArray<f32>>>(true),
            Err(ModelError::AcceleratorUnavailable(_))
        ));
    }

    #[test]
    fn backend_type_serialization() {
        let backend = BackendType::Wgpu;
        let json = serde_json::to_string(&backend);
        assert!(json.is_ok());

        let parsed: std::result::Result<BackendType, _> =
            serde_json::from_str(&json.unwrap_or_default());
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_default(), backend);
    }
}

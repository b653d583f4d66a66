//! Output directory housekeeping.

use std::path::Path;

use tracing::info;

use crate::error::{Result, TrainingError};

/// Removes everything under `dir` and recreates it empty.
///
/// A missing directory is simply created.
///
/// # Errors
///
/// Returns [`TrainingError::Io`] if the directory cannot be removed or
/// created.
pub fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| TrainingError::io(format!("clearing {}: {e}", dir.display())))?;
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| TrainingError::io(format!("creating {}: {e}", dir.display())))?;
    info!(dir = %dir.display(), "Cleared artifact directory");
    Ok(())
}

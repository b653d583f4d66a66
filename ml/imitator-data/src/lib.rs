//! Face parameter/image batch providers for the imitator.
//!
//! The training loop only sees the [`BatchSource`] trait: draw a full batch
//! of `(names, params, images)` from a [`Split`]. Two providers ship here:
//!
//! - [`SyntheticFaces`] - seeded procedural renderer, for tests and smoke runs
//! - [`FaceDataset`] - manifest + PNG directory tree rendered by the engine
//!
//! Batches are plain `Vec<f32>` buffers ([`FaceBatch`]); tensor conversion
//! happens in the training crate, so this crate has no ML backend dependency.
//!
//! # Example
//!
//! ```
//! use imitator_data::{BatchSource, Split, SyntheticConfig, SyntheticFaces};
//!
//! let config = SyntheticConfig::default().with_image_size(16).with_seed(42);
//! let mut faces = SyntheticFaces::new(config).unwrap_or_else(|e| panic!("{e}"));
//!
//! let batch = faces.get_batch(4, Split::Train).unwrap_or_else(|e| panic!("{e}"));
//! assert_eq!(batch.params_shape(), [4, 95]);
//! assert_eq!(batch.images_shape(), [4, 3, 16, 16]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod batch;
mod error;
mod folder;
mod synthetic;

pub use batch::{BatchSource, FaceBatch, IMAGE_CHANNELS, IMAGE_SIZE, PARAMS_CNT, Split};
pub use folder::{FaceDataset, MANIFEST_FILE, ManifestEntry, rgb_to_chw};
pub use synthetic::{SyntheticConfig, SyntheticFaces, render};

pub use error::{DataError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        BatchSource, DataError, FaceBatch, FaceDataset, Split, SyntheticConfig, SyntheticFaces,
    };
}

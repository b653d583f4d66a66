//! Training lifecycle for the face imitator.
//!
//! # Training Components
//!
//! - [`TrainingConfig`] - immutable configuration for a run
//! - [`Imitator`] - owns network and optimizer; trains, checkpoints,
//!   resumes, evaluates
//! - [`RunReport`] - per-step metrics plus the files a run wrote
//!
//! # Loss
//!
//! - [`l1_loss`] - mean absolute difference against the engine render
//!
//! # Metrics
//!
//! - [`MetricsSink`] - tagged scalars, weight images and summaries
//! - [`JsonlSink`] - one JSON event per line, PNG weight images
//! - [`MemorySink`] - in-memory, for tests
//!
//! # Schedule
//!
//! After step `s`:
//! - `(s + 1) % prev_freq == 0`: preview `imit_<s+1>.png`, learning-rate
//!   decay, weight snapshots
//! - `(s + 1) % save_freq == 0`: checkpoint `model_imitator_<s+1>.<ext>`
//!
//! # Example
//!
//! ```ignore
//! use burn::backend::Autodiff;
//! use burn_ndarray::NdArray;
//! use imitator_data::{SyntheticConfig, SyntheticFaces};
//! use imitator_training::{Imitator, JsonlSink, TrainingConfig};
//!
//! let config = TrainingConfig::from_json_file("imitator.json")?;
//! let optimizer = config.optimizer.init();
//! let mut imitator = Imitator::<Autodiff<NdArray>, _>::new(config, optimizer, &device)?;
//!
//! let mut faces = SyntheticFaces::new(SyntheticConfig::default().with_seed(42))?;
//! let mut sink = JsonlSink::open(&imitator.config().path_tensor_log)?;
//! let report = imitator.batch_train(&mut faces, &mut sink)?;
//! println!("{}", report.summary());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod artifacts;
mod config;
mod error;
mod imitator;
mod loss;
mod metrics;
mod preview;

pub use artifacts::clear_dir;
pub use config::{LR_FLOOR, OptimizerConfig, TrainingConfig, decayed_learning_rate};
pub use imitator::{Imitator, ImitatorCheckpoint};
pub use loss::l1_loss;
pub use metrics::{
    EVENTS_FILE, GRAPH_TAG, JsonlSink, LEARNING_RATE_TAG, LOSS_TAG, MemorySink, MetricEvent,
    MetricsSink, RunReport, StepMetrics,
};
pub use preview::{preview_path, write_preview};

pub use error::{Result, TrainingError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        Imitator, JsonlSink, MemorySink, MetricsSink, OptimizerConfig, RunReport,
        TrainingConfig, TrainingError,
    };
}

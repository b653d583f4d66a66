//! Burn network that imitates a face rendering engine.
//!
//! Maps a vector of 95 appearance parameters in `[0, 1]` to the
//! `3 x 512 x 512` image the engine would render, through a stack of
//! transposed convolutions with a residual enhancement block.
//!
//! # Components
//!
//! - [`adapt`] - rescales `[B, 95]` parameters to a `[B, 95, 1, 1]` map in `[-1, 1]`
//! - [`ImitatorNetwork`] - the upsampling generator
//! - [`Mode`] - explicit train/eval switch passed to every forward call
//! - [`InspectableLayer`] / [`WeightImage`] - named weight snapshots
//!
//! # Checkpoint Persistence
//!
//! Records are written through Burn's recorders:
//! - Binary format (compact, fast)
//! - JSON format (human-readable, debuggable)
//!
//! # Backend Support
//!
//! The network is generic over Burn backends. `burn-ndarray` is always
//! available; the `wgpu` feature enables the accelerator path.
//!
//! # Example
//!
//! ```ignore
//! use imitator_model::{ImitatorConfig, ImitatorNetwork, Mode};
//!
//! let device = Default::default();
//! let model = ImitatorNetwork::<MyBackend>::new(&ImitatorConfig::default(), &device)?;
//!
//! let params = Tensor::zeros([1, 95], &device);
//! let image = model.forward(params, Mode::Eval)?;
//! assert_eq!(image.dims(), [1, 3, 512, 512]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod adapter;
mod backend;
mod checkpoint;
mod config;
mod error;
mod network;
mod registry;

pub use adapter::{adapt, params_from_slice};
pub use backend::BackendType;
pub use checkpoint::{
    CHECKPOINT_PREFIX, CheckpointFormat, checkpoint_number, checkpoint_path, load_network,
    load_record, save_network, save_record,
};
pub use config::{DEFAULT_CHANNELS, ImitatorConfig, Mode, PARAMS_CNT};
pub use network::{ImitatorNetwork, NetworkRecord, ResidualUnit};
pub use registry::{InspectableLayer, WeightImage};

pub use error::{ModelError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        BackendType, CheckpointFormat, ImitatorConfig, ImitatorNetwork, InspectableLayer, Mode,
        ModelError, WeightImage, adapt, load_network, save_network,
    };
}

//! Training configuration.

use std::path::{Path, PathBuf};

use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use imitator_model::{CheckpointFormat, ImitatorConfig, ImitatorNetwork};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

/// Floor added to every decayed learning rate.
pub const LR_FLOOR: f64 = 1e-6;

/// Configuration for a training run.
///
/// Built once and handed to [`Imitator::new`](crate::Imitator::new); the
/// imitator never mutates it. The learning rate in effect during a run is
/// tracked separately by the imitator.
///
/// # Example
///
/// ```
/// use imitator_training::TrainingConfig;
///
/// let config = TrainingConfig::new(10)
///     .with_batch_size(4)
///     .with_prev_freq(5)
///     .with_save_freq(5);
/// assert_eq!(config.params_cnt(), 95);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Samples per training batch.
    pub batch_size: usize,

    /// Base learning rate.
    pub learning_rate: f64,

    /// Last step index; steps run from the initial step to this, inclusive.
    pub total_steps: usize,

    /// Preview / learning-rate decay cadence in steps.
    pub prev_freq: usize,

    /// Checkpoint cadence in steps.
    pub save_freq: usize,

    /// Directory of the metrics log.
    pub path_tensor_log: PathBuf,

    /// Directory checkpoints are loaded from.
    pub path_to_inference: PathBuf,

    /// Directory preview images are written to.
    pub preview_dir: PathBuf,

    /// Directory checkpoints are written to.
    pub model_dir: PathBuf,

    /// Checkpoint file format.
    pub checkpoint_format: CheckpointFormat,

    /// Number of held-out batches averaged by evaluation.
    pub eval_steps: usize,

    /// Network configuration.
    pub model: ImitatorConfig,

    /// Optimizer configuration.
    pub optimizer: OptimizerConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(60_000)
    }
}

impl TrainingConfig {
    /// Creates a configuration running `total_steps` steps.
    #[must_use]
    pub fn new(total_steps: usize) -> Self {
        Self {
            batch_size: 16,
            learning_rate: 1e-3,
            total_steps,
            prev_freq: 1_000,
            save_freq: 10_000,
            path_tensor_log: PathBuf::from("./output/log"),
            path_to_inference: PathBuf::from("./output/imitator"),
            preview_dir: PathBuf::from("./output/preview"),
            model_dir: PathBuf::from("./output/imitator"),
            checkpoint_format: CheckpointFormat::Binary,
            eval_steps: 100,
            model: ImitatorConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the base learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the preview cadence.
    #[must_use]
    pub const fn with_prev_freq(mut self, prev_freq: usize) -> Self {
        self.prev_freq = prev_freq;
        self
    }

    /// Sets the checkpoint cadence.
    #[must_use]
    pub const fn with_save_freq(mut self, save_freq: usize) -> Self {
        self.save_freq = save_freq;
        self
    }

    /// Sets the number of evaluation batches.
    #[must_use]
    pub const fn with_eval_steps(mut self, eval_steps: usize) -> Self {
        self.eval_steps = eval_steps;
        self
    }

    /// Sets the parameter vector length.
    #[must_use]
    pub const fn with_params_cnt(mut self, params_cnt: usize) -> Self {
        self.model.params_cnt = params_cnt;
        self
    }

    /// Sets the network configuration.
    #[must_use]
    pub fn with_model(mut self, model: ImitatorConfig) -> Self {
        self.model = model;
        self
    }

    /// Sets the optimizer configuration.
    #[must_use]
    pub const fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets the checkpoint format.
    #[must_use]
    pub const fn with_checkpoint_format(mut self, format: CheckpointFormat) -> Self {
        self.checkpoint_format = format;
        self
    }

    /// Places the log, preview and model directories under `root`, and
    /// loads checkpoints from the model directory.
    #[must_use]
    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.path_tensor_log = root.join("log");
        self.preview_dir = root.join("preview");
        self.model_dir = root.join("imitator");
        self.path_to_inference = self.model_dir.clone();
        self
    }

    /// Returns the parameter vector length.
    #[must_use]
    pub const fn params_cnt(&self) -> usize {
        self.model.params_cnt
    }

    /// Returns whether a preview and learning-rate decay happen after `step`.
    #[must_use]
    pub const fn should_preview(&self, step: usize) -> bool {
        self.prev_freq > 0 && (step + 1) % self.prev_freq == 0
    }

    /// Returns whether a checkpoint is saved after `step`.
    #[must_use]
    pub const fn should_checkpoint(&self, step: usize) -> bool {
        self.save_freq > 0 && (step + 1) % self.save_freq == 0
    }

    /// Validates the configuration.
    ///
    /// Returns `true` if all values are valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.batch_size > 0
            && self.learning_rate > 0.0
            && self.total_steps > 0
            && self.prev_freq > 0
            && self.save_freq > 0
            && self.eval_steps > 0
            && self.model.is_valid()
            && self.optimizer.is_valid()
    }

    /// Fails with [`TrainingError::InvalidConfig`] unless [`is_valid`](Self::is_valid).
    ///
    /// # Errors
    ///
    /// Returns the offending configuration in the error message.
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(TrainingError::invalid_config(format!("{self:?}")))
        }
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Adam optimizer configuration.
///
/// # Example
///
/// ```
/// use imitator_training::OptimizerConfig;
///
/// let adam = OptimizerConfig::default();
/// assert!((adam.beta1 - 0.9).abs() < 1e-6);
/// assert!(adam.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// First moment decay.
    pub beta1: f32,

    /// Second moment decay.
    pub beta2: f32,

    /// Epsilon for numerical stability.
    pub epsilon: f32,

    /// Weight decay (L2 penalty, 0.0 = disabled).
    pub weight_decay: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam()
    }
}

impl OptimizerConfig {
    /// Creates the standard Adam configuration.
    #[must_use]
    pub const fn adam() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        }
    }

    /// Sets weight decay.
    #[must_use]
    pub const fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Validates the configuration.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0.0..1.0).contains(&self.beta1)
            && (0.0..1.0).contains(&self.beta2)
            && self.epsilon > 0.0
            && self.weight_decay >= 0.0
    }

    /// Builds the Burn optimizer configuration.
    #[must_use]
    pub fn to_adam(&self) -> AdamConfig {
        let decay = (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay));
        AdamConfig::new()
            .with_beta_1(self.beta1)
            .with_beta_2(self.beta2)
            .with_epsilon(self.epsilon)
            .with_weight_decay(decay)
    }

    /// Initializes Adam for an [`ImitatorNetwork`].
    #[must_use]
    pub fn init<B: AutodiffBackend>(&self) -> impl Optimizer<ImitatorNetwork<B>, B> + Clone + use<B> {
        self.to_adam().init::<B, ImitatorNetwork<B>>()
    }
}

/// Linear decay toward [`LR_FLOOR`] as a function of remaining steps:
/// `base * (total_steps - step) / total_steps + LR_FLOOR`.
///
/// # Example
///
/// ```
/// use imitator_training::{LR_FLOOR, decayed_learning_rate};
///
/// let lr = decayed_learning_rate(1e-3, 5, 10);
/// assert!((lr - (5e-4 + LR_FLOOR)).abs() < 1e-12);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decayed_learning_rate(base_lr: f64, step: usize, total_steps: usize) -> f64 {
    if total_steps == 0 {
        return LR_FLOOR;
    }
    let remaining = total_steps.saturating_sub(step) as f64;
    base_lr * remaining / total_steps as f64 + LR_FLOOR
}

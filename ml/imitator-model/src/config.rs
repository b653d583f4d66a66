//! Network configuration and forward mode.

use serde::{Deserialize, Serialize};

/// Number of renderer parameters fed to the network.
pub const PARAMS_CNT: usize = 95;

/// Channel widths of the head and the six upsampling stages.
pub const DEFAULT_CHANNELS: [usize; 7] = [512, 512, 512, 256, 128, 64, 64];

/// Configuration for [`ImitatorNetwork`](crate::ImitatorNetwork).
///
/// `channels[0]` is the width of the 4x4 head; every following entry adds
/// one stride-2 upsampling stage, and the output stage doubles once more.
/// The output side length is therefore `4 << channels.len()`.
///
/// # Example
///
/// ```
/// use imitator_model::ImitatorConfig;
///
/// let config = ImitatorConfig::default();
/// assert_eq!(config.params_cnt, 95);
/// assert_eq!(config.image_size(), 512);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImitatorConfig {
    /// Length of the parameter vector.
    pub params_cnt: usize,

    /// Head width followed by upsampling stage widths.
    pub channels: Vec<usize>,

    /// Residual units in the enhancement block.
    pub residual_units: usize,

    /// Dropout probability on the raw output in training mode.
    pub dropout: f64,

    /// Standard deviation of the normal weight initializer.
    pub init_std: f64,

    /// Output image channels.
    pub out_channels: usize,
}

impl Default for ImitatorConfig {
    fn default() -> Self {
        Self {
            params_cnt: PARAMS_CNT,
            channels: DEFAULT_CHANNELS.to_vec(),
            residual_units: 2,
            dropout: 0.5,
            init_std: 0.02,
            out_channels: 3,
        }
    }
}

impl ImitatorConfig {
    /// Sets the channel widths.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the number of residual units.
    #[must_use]
    pub const fn with_residual_units(mut self, units: usize) -> Self {
        self.residual_units = units;
        self
    }

    /// Sets the dropout probability.
    #[must_use]
    pub const fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Sets the initializer standard deviation.
    #[must_use]
    pub const fn with_init_std(mut self, std: f64) -> Self {
        self.init_std = std;
        self
    }

    /// Returns the generated image side length.
    #[must_use]
    pub fn image_size(&self) -> usize {
        if self.channels.is_empty() {
            0
        } else {
            4 << self.channels.len()
        }
    }

    /// Returns the number of stride-2 stages between head and output.
    #[must_use]
    pub fn upsample_stages(&self) -> usize {
        self.channels.len().saturating_sub(1)
    }

    /// Validates the configuration.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.params_cnt > 0
            && !self.channels.is_empty()
            && self.channels.len() < 16
            && self.channels.iter().all(|&c| c > 0)
            && (0.0..1.0).contains(&self.dropout)
            && self.init_std > 0.0
            && self.out_channels > 0
    }
}

/// Forward-pass mode.
///
/// Passed explicitly to every forward call; the network holds no
/// train/eval flag of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mode {
    /// Stochastic regularization active.
    Train,

    /// Deterministic inference.
    #[default]
    Eval,
}

impl Mode {
    /// Returns `true` in training mode.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, Self::Train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let config = ImitatorConfig::default();
        assert_eq!(config.channels, DEFAULT_CHANNELS.to_vec());
        assert_eq!(config.residual_units, 2);
        assert_eq!(config.upsample_stages(), 6);
        assert_eq!(config.image_size(), 512);
        assert!(config.is_valid());
    }

    #[test]
    fn config_builder() {
        let config = ImitatorConfig::default()
            .with_channels(vec![8, 4])
            .with_residual_units(1)
            .with_dropout(0.0)
            .with_init_std(0.1);
        assert_eq!(config.image_size(), 16);
        assert_eq!(config.upsample_stages(), 1);
        assert_eq!(config.residual_units, 1);
        assert!(config.is_valid());
    }

    #[test]
    fn config_invalid() {
        assert!(!ImitatorConfig::default().with_channels(vec![]).is_valid());
        assert!(!ImitatorConfig::default().with_channels(vec![8, 0]).is_valid());
        assert!(!ImitatorConfig::default().with_dropout(1.0).is_valid());
        assert!(!ImitatorConfig::default().with_init_std(0.0).is_valid());
    }

    #[test]
    fn mode_flags() {
        assert!(Mode::Train.is_train());
        assert!(!Mode::Eval.is_train());
        assert_eq!(Mode::default(), Mode::Eval);
    }

    #[test]
    fn config_serialization() {
        let config = ImitatorConfig::default();
        let json = serde_json::to_string(&config);
        assert!(json.is_ok());

        let parsed: std::result::Result<ImitatorConfig, _> =
            serde_json::from_str(&json.unwrap_or_default());
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_default(), config);
    }
}

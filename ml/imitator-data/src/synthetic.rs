//! Seeded in-memory provider that renders smooth faces procedurally.
//!
//! The "renderer" here is a cheap closed-form shading of the parameter
//! vector, so an imitator can actually fit it. Images are rendered when a
//! batch is drawn; only parameter vectors are kept in memory.

#![allow(clippy::cast_precision_loss)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{BatchSource, FaceBatch, IMAGE_CHANNELS, IMAGE_SIZE, PARAMS_CNT, Split};
use crate::error::{DataError, Result};

/// Configuration for [`SyntheticFaces`].
///
/// # Example
///
/// ```
/// use imitator_data::SyntheticConfig;
///
/// let config = SyntheticConfig::default().with_image_size(64).with_seed(7);
/// assert_eq!(config.params_cnt, 95);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Parameters per sample.
    pub params_cnt: usize,

    /// Rendered image side length.
    pub image_size: usize,

    /// Samples in the train split.
    pub train_samples: usize,

    /// Samples in the test split.
    pub test_samples: usize,

    /// Random seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            params_cnt: PARAMS_CNT,
            image_size: IMAGE_SIZE,
            train_samples: 256,
            test_samples: 64,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    /// Sets the image side length.
    #[must_use]
    pub const fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Sets the split sizes.
    #[must_use]
    pub const fn with_samples(mut self, train: usize, test: usize) -> Self {
        self.train_samples = train;
        self.test_samples = test;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.params_cnt > 0 && self.image_size > 0
    }
}

/// Procedural face provider backed by a seeded `ChaCha8Rng`.
#[derive(Debug, Clone)]
pub struct SyntheticFaces {
    config: SyntheticConfig,
    train: Vec<Vec<f32>>,
    test: Vec<Vec<f32>>,
    rng: ChaCha8Rng,
}

impl SyntheticFaces {
    /// Creates a provider and samples every parameter vector up front.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.is_valid() {
            return Err(DataError::invalid_config(format!(
                "params_cnt and image_size must be > 0, got {} and {}",
                config.params_cnt, config.image_size
            )));
        }

        let mut rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        let mut sample = |count: usize| -> Vec<Vec<f32>> {
            (0..count)
                .map(|_| (0..config.params_cnt).map(|_| rng.r#gen::<f32>()).collect())
                .collect()
        };
        let train = sample(config.train_samples);
        let test = sample(config.test_samples);

        Ok(Self {
            config,
            train,
            test,
            rng,
        })
    }

    /// Returns the provider configuration.
    #[must_use]
    pub const fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Returns the number of samples in `split`.
    #[must_use]
    pub fn len(&self, split: Split) -> usize {
        self.samples(split).len()
    }

    /// Returns `true` if both splits are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }

    fn samples(&self, split: Split) -> &[Vec<f32>] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

/// Renders a CHW image from a parameter vector.
///
/// Each channel is a planar gradient whose slopes and offset are read from
/// the parameters, so every pixel stays in `[0, 1]`.
#[must_use]
pub fn render(params: &[f32], image_size: usize) -> Vec<f32> {
    let n = params.len().max(1);
    let at = |i: usize| params.get(i % n).copied().unwrap_or(0.5);
    let denom = image_size.saturating_sub(1).max(1) as f32;

    let mut image = Vec::with_capacity(IMAGE_CHANNELS * image_size * image_size);
    for c in 0..IMAGE_CHANNELS {
        let (gx, gy, bias) = (at(c), at(c + IMAGE_CHANNELS), at(c + 2 * IMAGE_CHANNELS));
        for y in 0..image_size {
            let v = y as f32 / denom;
            for x in 0..image_size {
                let u = x as f32 / denom;
                image.push(((gx * u + gy * v + bias) / 3.0).clamp(0.0, 1.0));
            }
        }
    }
    image
}

impl BatchSource for SyntheticFaces {
    fn get_batch(&mut self, batch_size: usize, split: Split) -> Result<FaceBatch> {
        let count = self.len(split);
        if count == 0 {
            return Err(DataError::empty_split(split.name()));
        }

        let indices: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..count))
            .collect();
        debug!(%split, batch_size, "Drawing synthetic batch");

        let samples = self.samples(split);
        let mut names = Vec::with_capacity(batch_size);
        let mut params = Vec::with_capacity(batch_size * self.config.params_cnt);
        let mut images = Vec::new();
        for index in indices {
            names.push(format!("{split}_{index:05}"));
            params.extend_from_slice(&samples[index]);
            images.extend(render(&samples[index], self.config.image_size));
        }

        FaceBatch::new(
            names,
            params,
            images,
            self.config.params_cnt,
            self.config.image_size,
        )
    }

    fn params_cnt(&self) -> usize {
        self.config.params_cnt
    }

    fn image_size(&self) -> usize {
        self.config.image_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(seed: u64) -> SyntheticFaces {
        let config = SyntheticConfig::default()
            .with_image_size(8)
            .with_samples(10, 4)
            .with_seed(seed);
        SyntheticFaces::new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn config_default() {
        let config = SyntheticConfig::default();
        assert_eq!(config.params_cnt, PARAMS_CNT);
        assert_eq!(config.image_size, IMAGE_SIZE);
        assert!(config.is_valid());
    }

    #[test]
    fn config_invalid_rejected() {
        let config = SyntheticConfig::default().with_image_size(0);
        assert!(matches!(
            SyntheticFaces::new(config),
            Err(DataError::InvalidConfig(_))
        ));
    }

    #[test]
    fn split_sizes() {
        let faces = small(1);
        assert_eq!(faces.len(Split::Train), 10);
        assert_eq!(faces.len(Split::Test), 4);
        assert!(!faces.is_empty());
    }

    #[test]
    fn batch_is_full_and_in_range() {
        let mut faces = small(2);
        let batch = faces
            .get_batch(4, Split::Train)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(batch.batch_size, 4);
        assert_eq!(batch.params_shape(), [4, PARAMS_CNT]);
        assert_eq!(batch.images_shape(), [4, 3, 8, 8]);
        assert!(batch.params.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(batch.images.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn same_seed_same_batches() {
        let mut a = small(42);
        let mut b = small(42);
        for _ in 0..3 {
            let x = a.get_batch(2, Split::Test).unwrap_or_else(|e| panic!("{e}"));
            let y = b.get_batch(2, Split::Test).unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(x, y);
        }
    }

    #[test]
    fn empty_split_errors() {
        let config = SyntheticConfig::default()
            .with_image_size(4)
            .with_samples(3, 0)
            .with_seed(0);
        let mut faces = SyntheticFaces::new(config).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            faces.get_batch(1, Split::Test),
            Err(DataError::EmptySplit(_))
        ));
    }

    #[test]
    fn render_matches_params() {
        let params = vec![0.0; PARAMS_CNT];
        assert!(render(&params, 4).iter().all(|v| v.abs() < 1e-6));

        let params = vec![1.0; PARAMS_CNT];
        let image = render(&params, 4);
        assert_eq!(image.len(), 3 * 4 * 4);
        // Bottom-right corner saturates.
        assert!((image[15] - 1.0).abs() < 1e-6);
    }
}

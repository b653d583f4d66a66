//! Batch types shared by every provider.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Number of facial appearance parameters the renderer accepts.
pub const PARAMS_CNT: usize = 95;

/// Number of color channels in reference images.
pub const IMAGE_CHANNELS: usize = 3;

/// Side length of reference images rendered by the engine.
pub const IMAGE_SIZE: usize = 512;

/// Dataset split to draw a batch from.
///
/// # Example
///
/// ```
/// use imitator_data::Split;
///
/// assert_eq!(Split::Train.name(), "train");
/// assert_eq!(Split::default(), Split::Train);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Split {
    /// Samples used for optimization.
    #[default]
    Train,

    /// Held-out samples used for evaluation.
    Test,
}

impl Split {
    /// Returns the split name, also used as its directory name on disk.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A batch of renderer samples.
///
/// Parameters are stored row-major as `[batch_size, params_cnt]` and
/// images in CHW layout as `[batch_size, 3, image_size, image_size]`,
/// both normalized to `[0, 1]`. Row `i` of `params` and image `i` come
/// from the same renderer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBatch {
    /// Sample names, one per row.
    pub names: Vec<String>,

    /// Flat parameter data.
    pub params: Vec<f32>,

    /// Flat image data.
    pub images: Vec<f32>,

    /// Number of samples.
    pub batch_size: usize,

    /// Parameters per sample.
    pub params_cnt: usize,

    /// Image side length in pixels.
    pub image_size: usize,
}

impl FaceBatch {
    /// Creates a batch after checking every buffer against the declared shape.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ShapeMismatch`] if a buffer length disagrees
    /// with `batch_size`, `params_cnt` or `image_size`.
    pub fn new(
        names: Vec<String>,
        params: Vec<f32>,
        images: Vec<f32>,
        params_cnt: usize,
        image_size: usize,
    ) -> Result<Self> {
        let batch = Self {
            batch_size: names.len(),
            names,
            params,
            images,
            params_cnt,
            image_size,
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Returns the `[batch, params]` shape of the parameter buffer.
    #[must_use]
    pub const fn params_shape(&self) -> [usize; 2] {
        [self.batch_size, self.params_cnt]
    }

    /// Returns the `[batch, channels, height, width]` shape of the image buffer.
    #[must_use]
    pub const fn images_shape(&self) -> [usize; 4] {
        [
            self.batch_size,
            IMAGE_CHANNELS,
            self.image_size,
            self.image_size,
        ]
    }

    /// Returns the parameter row of sample `index`.
    #[must_use]
    pub fn params_row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.params_cnt)?;
        self.params.get(start..start + self.params_cnt)
    }

    /// Returns the CHW image of sample `index`.
    #[must_use]
    pub fn image(&self, index: usize) -> Option<&[f32]> {
        let len = IMAGE_CHANNELS * self.image_size * self.image_size;
        let start = index.checked_mul(len)?;
        self.images.get(start..start + len)
    }

    /// Checks buffer lengths against the declared shape.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ShapeMismatch`] naming the offending buffer.
    pub fn validate(&self) -> Result<()> {
        if self.names.len() != self.batch_size {
            return Err(DataError::shape_mismatch(
                format!("{} names", self.batch_size),
                format!("{} names", self.names.len()),
            ));
        }
        let params_len = self.batch_size * self.params_cnt;
        if self.params.len() != params_len {
            return Err(DataError::shape_mismatch(
                format!("{:?} params", self.params_shape()),
                format!("{} values", self.params.len()),
            ));
        }
        let images_len: usize = self.images_shape().iter().product();
        if self.images.len() != images_len {
            return Err(DataError::shape_mismatch(
                format!("{:?} images", self.images_shape()),
                format!("{} values", self.images.len()),
            ));
        }
        Ok(())
    }

    /// Returns `true` if every buffer matches the declared shape.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// A source of `(names, params, images)` batches.
///
/// Implementations never return a short batch: a successful call holds
/// exactly `batch_size` samples.
pub trait BatchSource {
    /// Draws one batch from `split`.
    ///
    /// # Errors
    ///
    /// Returns an error if the split is empty or a sample cannot be read.
    fn get_batch(&mut self, batch_size: usize, split: Split) -> Result<FaceBatch>;

    /// Parameters per sample produced by this source.
    fn params_cnt(&self) -> usize;

    /// Image side length produced by this source.
    fn image_size(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(size: usize, params_cnt: usize, image_size: usize) -> Result<FaceBatch> {
        FaceBatch::new(
            (0..size).map(|i| format!("face_{i}")).collect(),
            vec![0.5; size * params_cnt],
            vec![0.25; size * IMAGE_CHANNELS * image_size * image_size],
            params_cnt,
            image_size,
        )
    }

    #[test]
    fn split_names() {
        assert_eq!(Split::Train.name(), "train");
        assert_eq!(Split::Test.name(), "test");
        assert_eq!(format!("{}", Split::Test), "test");
    }

    #[test]
    fn batch_new_valid() {
        let batch = batch(2, PARAMS_CNT, 8);
        assert!(batch.is_ok());
        let batch = batch.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.params_shape(), [2, PARAMS_CNT]);
        assert_eq!(batch.images_shape(), [2, 3, 8, 8]);
        assert!(batch.is_valid());
    }

    #[test]
    fn batch_rejects_short_params() {
        let result = FaceBatch::new(
            vec!["a".into()],
            vec![0.5; PARAMS_CNT - 1],
            vec![0.0; 3 * 4 * 4],
            PARAMS_CNT,
            4,
        );
        assert!(matches!(result, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn batch_rejects_wrong_image_len() {
        let result = FaceBatch::new(
            vec!["a".into()],
            vec![0.5; PARAMS_CNT],
            vec![0.0; 3 * 4 * 5],
            PARAMS_CNT,
            4,
        );
        assert!(matches!(result, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn batch_rows() {
        let batch = batch(3, 4, 2).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(batch.params_row(2).map(<[f32]>::len), Some(4));
        assert!(batch.params_row(3).is_none());
        assert_eq!(batch.image(0).map(<[f32]>::len), Some(12));
        assert!(batch.image(3).is_none());
    }

    #[test]
    fn batch_serialization() {
        let batch = batch(1, 2, 1).unwrap_or_else(|e| panic!("{e}"));
        let json = serde_json::to_string(&batch);
        assert!(json.is_ok());

        let parsed: std::result::Result<FaceBatch, _> =
            serde_json::from_str(&json.unwrap_or_default());
        assert!(parsed.is_ok());
    }
}

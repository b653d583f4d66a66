//! Named layers exported as weight snapshots.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use burn::prelude::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A layer registered for weight inspection.
#[derive(Debug, Clone)]
pub struct InspectableLayer<B: Backend> {
    /// Registry name, e.g. `head` or `upsample_6`.
    pub name: String,

    /// Transposed-convolution weight `[in, out, k, k]`.
    pub weight: Tensor<B, 4>,
}

impl<B: Backend> InspectableLayer<B> {
    /// Creates a registry entry.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: Tensor<B, 4>) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// Renders the weights as a grayscale image.
    ///
    /// Rows are input channels; each row holds the `out * k * k` kernel
    /// taps. Values are min-max normalized to `0..=255`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Io`] if the tensor data cannot be read back.
    pub fn snapshot(&self) -> Result<WeightImage> {
        let [c_in, c_out, kh, kw] = self.weight.dims();
        let values = self
            .weight
            .clone()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ModelError::io(format!("reading weights of {}: {e:?}", self.name)))?;
        Ok(WeightImage::from_values(
            self.name.clone(),
            c_out * kh * kw,
            c_in,
            &values,
        ))
    }
}

/// Grayscale weight visualization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightImage {
    /// Layer name.
    pub name: String,

    /// Width in pixels.
    pub width: usize,

    /// Height in pixels.
    pub height: usize,

    /// Row-major 8-bit luminance.
    pub pixels: Vec<u8>,
}

impl WeightImage {
    /// Normalizes `values` into an 8-bit `width x height` image.
    ///
    /// A constant input maps to mid-gray.
    #[must_use]
    pub fn from_values(name: impl Into<String>, width: usize, height: usize, values: &[f32]) -> Self {
        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let pixels = values
            .iter()
            .take(width * height)
            .map(|&v| {
                if range > f32::EPSILON {
                    ((v - min) / range * 255.0).round() as u8
                } else {
                    128
                }
            })
            .collect();
        Self {
            name: name.into(),
            width,
            height,
            pixels,
        }
    }
}

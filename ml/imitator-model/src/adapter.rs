//! Parameter-to-tensor adapter.

use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::{ModelError, Result};

/// Builds a `[batch, params_cnt]` tensor from flat row-major values.
///
/// # Errors
///
/// Returns [`ModelError::ShapeMismatch`] if `values.len() != batch * params_cnt`.
pub fn params_from_slice<B: Backend>(
    values: &[f32],
    batch: usize,
    params_cnt: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    if values.len() != batch * params_cnt {
        return Err(ModelError::shape_mismatch(
            format!("[{batch}, {params_cnt}] ({} values)", batch * params_cnt),
            format!("{} values", values.len()),
        ));
    }
    let data = TensorData::new(values.to_vec(), [batch, params_cnt]);
    Ok(Tensor::from_data(data, device))
}

/// Rescales `[batch, params_cnt]` parameters from `[0, 1]` to `[-1, 1]` and
/// lays them out as a `[batch, params_cnt, 1, 1]` feature map.
///
/// The result is marked as requiring gradients so callers can
/// differentiate the rendering with respect to its inputs.
///
/// # Errors
///
/// Returns [`ModelError::ShapeMismatch`] if the second dimension is not
/// `params_cnt`.
pub fn adapt<B: Backend>(params: Tensor<B, 2>, params_cnt: usize) -> Result<Tensor<B, 4>> {
    let [batch, length] = params.dims();
    if length != params_cnt {
        return Err(ModelError::shape_mismatch(
            format!("[{batch}, {params_cnt}]"),
            format!("[{batch}, {length}]"),
        ));
    }
    let input = params.reshape([batch, length, 1, 1]).mul_scalar(2.0).sub_scalar(1.0);
    Ok(input.require_grad())
}

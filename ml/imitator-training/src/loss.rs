//! Reconstruction loss.

use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::error::{Result, TrainingError};

/// Mean absolute error between a generated and a reference image batch.
///
/// # Arguments
///
/// - `generated`: Network output `[batch, 3, size, size]`
/// - `reference`: Engine renders `[batch, 3, size, size]`
///
/// # Returns
///
/// Scalar loss value.
///
/// # Errors
///
/// Returns [`TrainingError::ShapeMismatch`] if the shapes differ.
pub fn l1_loss<B: Backend>(generated: Tensor<B, 4>, reference: Tensor<B, 4>) -> Result<Tensor<B, 1>> {
    let expected = reference.dims();
    let actual = generated.dims();
    if expected != actual {
        return Err(TrainingError::shape_mismatch(
            format!("{expected:?}"),
            format!("{actual:?}"),
        ));
    }
    Ok((generated - reference).abs().mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn l1_loss_identical_is_zero() {
        let device = <TestBackend as Backend>::Device::default();
        let a = Tensor::<TestBackend, 4>::ones([2, 3, 4, 4], &device);
        let loss: f32 = l1_loss(a.clone(), a)
            .unwrap_or_else(|e| panic!("{e}"))
            .into_scalar();
        assert!(loss.abs() < 1e-7);
    }

    #[test]
    fn l1_loss_is_mean_absolute_difference() {
        let device = <TestBackend as Backend>::Device::default();
        let generated = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0_f32, 1.0, 0.5, 0.25], [1, 1, 2, 2]),
            &device,
        );
        let reference = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0_f32, 1.0, 0.0, 0.75], [1, 1, 2, 2]),
            &device,
        );
        let loss: f32 = l1_loss(generated, reference)
            .unwrap_or_else(|e| panic!("{e}"))
            .into_scalar();
        // (1 + 0 + 0.5 + 0.5) / 4
        assert!((loss - 0.5).abs() < 1e-6);
    }

    #[test]
    fn l1_loss_rejects_mismatched_shapes() {
        let device = <TestBackend as Backend>::Device::default();
        let a = Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        let b = Tensor::<TestBackend, 4>::zeros([2, 3, 8, 8], &device);
        assert!(matches!(
            l1_loss(a, b),
            Err(TrainingError::ShapeMismatch { .. })
        ));
    }
}

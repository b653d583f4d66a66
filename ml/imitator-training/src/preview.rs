//! Side-by-side preview images of reference renders and network output.

use std::path::{Path, PathBuf};

use burn::prelude::Backend;
use burn::tensor::Tensor;
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::error::{Result, TrainingError};

/// Returns `<preview_dir>/imit_<step+1>.png`.
#[must_use]
pub fn preview_path(preview_dir: &Path, step: usize) -> PathBuf {
    preview_dir.join(format!("imit_{}.png", step + 1))
}

/// Writes one row per sample: the reference on the left, the network
/// output on the right.
///
/// Both tensors are `[batch, 3, size, size]` with values in `[0, 1]`.
///
/// # Errors
///
/// - [`TrainingError::ShapeMismatch`] if the batches differ in shape or are
///   not three-channel
/// - [`TrainingError::Io`] if the image cannot be written
pub fn write_preview<B: Backend>(
    path: &Path,
    reference: Tensor<B, 4>,
    generated: Tensor<B, 4>,
) -> Result<PathBuf> {
    let dims = reference.dims();
    if dims != generated.dims() || dims[1] != 3 {
        return Err(TrainingError::shape_mismatch(
            format!("[{}, 3, {}, {}]", dims[0], dims[2], dims[3]),
            format!("{:?} and {:?}", dims, generated.dims()),
        ));
    }
    let reference = to_vec(reference)?;
    let generated = to_vec(generated)?;
    let canvas = compose(&reference, &generated, dims[0], dims[2], dims[3])?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;
    debug!(path = %path.display(), batch = dims[0], "Wrote preview");
    Ok(path.to_path_buf())
}

fn to_vec<B: Backend>(tensor: Tensor<B, 4>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainingError::io(format!("reading preview tensor: {e:?}")))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn compose(
    reference: &[f32],
    generated: &[f32],
    batch: usize,
    height: usize,
    width: usize,
) -> Result<RgbImage> {
    let too_large = || TrainingError::io(format!("preview of {batch} x {height}x{width} is too large"));
    let canvas_w = u32::try_from(width * 2).map_err(|_| too_large())?;
    let canvas_h = u32::try_from(height * batch).map_err(|_| too_large())?;
    let mut canvas = RgbImage::new(canvas_w, canvas_h);
    let plane = height * width;
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    for b in 0..batch {
        let base = b * 3 * plane;
        for y in 0..height {
            for x in 0..width {
                let at = |data: &[f32]| {
                    let i = base + y * width + x;
                    Rgb([
                        to_u8(data[i]),
                        to_u8(data[i + plane]),
                        to_u8(data[i + 2 * plane]),
                    ])
                };
                let row = (b * height + y) as u32;
                canvas.put_pixel(x as u32, row, at(reference));
                canvas.put_pixel((width + x) as u32, row, at(generated));
            }
        }
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn preview_path_uses_next_step_number() {
        assert_eq!(
            preview_path(Path::new("prev"), 4),
            Path::new("prev").join("imit_5.png")
        );
    }

    #[test]
    fn write_preview_layout() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = preview_path(&dir.path().join("preview"), 0);

        let reference = Tensor::<TestBackend, 4>::ones([2, 3, 8, 8], &device);
        let generated = Tensor::<TestBackend, 4>::zeros([2, 3, 8, 8], &device);
        let written = write_preview(&path, reference, generated).unwrap_or_else(|e| panic!("{e}"));

        let img = image::open(&written)
            .unwrap_or_else(|e| panic!("{e}"))
            .to_rgb8();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(img.get_pixel(15, 15), &Rgb([0, 0, 0]));
    }

    #[test]
    fn write_preview_rejects_mismatch() {
        let device = <TestBackend as Backend>::Device::default();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let reference = Tensor::<TestBackend, 4>::ones([2, 3, 8, 8], &device);
        let generated = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        assert!(matches!(
            write_preview(&dir.path().join("x.png"), reference, generated),
            Err(TrainingError::ShapeMismatch { .. })
        ));
    }
}

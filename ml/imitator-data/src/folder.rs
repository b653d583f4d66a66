//! On-disk provider of renderer samples.
//!
//! Layout, one directory per split:
//!
//! ```text
//! <root>/train/manifest.json   [{"name": "0001", "params": [..95 floats..]}, ...]
//! <root>/train/0001.png
//! <root>/test/manifest.json
//! <root>/test/0042.png
//! ```

#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::{BatchSource, FaceBatch, IMAGE_CHANNELS, Split};
use crate::error::{DataError, Result};

/// File name of the per-split sample index.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One manifest entry: the renderer inputs for a stored image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Sample name; the image lives at `<split>/<name>.png`.
    pub name: String,

    /// Renderer parameters in `[0, 1]`.
    pub params: Vec<f32>,
}

/// Face dataset read from a directory tree.
#[derive(Debug)]
pub struct FaceDataset {
    root: PathBuf,
    params_cnt: usize,
    image_size: usize,
    train: Vec<ManifestEntry>,
    test: Vec<ManifestEntry>,
    rng: ChaCha8Rng,
}

impl FaceDataset {
    /// Opens a dataset, reading the manifest of every split that exists.
    ///
    /// A missing split directory yields an empty split.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest cannot be parsed or an entry has the
    /// wrong parameter count.
    pub fn open(
        root: impl Into<PathBuf>,
        params_cnt: usize,
        image_size: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        if params_cnt == 0 || image_size == 0 {
            return Err(DataError::invalid_config(
                "params_cnt and image_size must be > 0",
            ));
        }
        let root = root.into();
        let train = read_manifest(&root, Split::Train, params_cnt)?;
        let test = read_manifest(&root, Split::Test, params_cnt)?;
        info!(
            root = %root.display(),
            train = train.len(),
            test = test.len(),
            "Opened face dataset"
        );

        Ok(Self {
            root,
            params_cnt,
            image_size,
            train,
            test,
            rng: seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64),
        })
    }

    /// Returns the dataset root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the number of entries in `split`.
    #[must_use]
    pub fn len(&self, split: Split) -> usize {
        self.entries(split).len()
    }

    /// Returns `true` if both splits are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }

    fn entries(&self, split: Split) -> &[ManifestEntry] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }

    fn load_image(&self, split: Split, name: &str) -> Result<Vec<f32>> {
        let path = self.root.join(split.name()).join(format!("{name}.png"));
        let decoded = image::open(&path)
            .map_err(|e| DataError::image(path.display().to_string(), e.to_string()))?;
        let side = self.image_size as u32;
        let rgb = if decoded.width() == side && decoded.height() == side {
            decoded.to_rgb8()
        } else {
            decoded
                .resize_exact(side, side, FilterType::Triangle)
                .to_rgb8()
        };
        Ok(rgb_to_chw(&rgb))
    }
}

/// Converts an 8-bit RGB image into normalized CHW floats.
#[must_use]
pub fn rgb_to_chw(rgb: &image::RgbImage) -> Vec<f32> {
    let (w, h) = rgb.dimensions();
    let plane = (w as usize) * (h as usize);
    let mut chw = vec![0.0; IMAGE_CHANNELS * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..IMAGE_CHANNELS {
            chw[c * plane + i] = f32::from(pixel[c]) / 255.0;
        }
    }
    chw
}

fn read_manifest(root: &Path, split: Split, params_cnt: usize) -> Result<Vec<ManifestEntry>> {
    let path = root.join(split.name()).join(MANIFEST_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "No manifest, split is empty");
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(&path)?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&json)?;
    if let Some(bad) = entries.iter().find(|e| e.params.len() != params_cnt) {
        return Err(DataError::shape_mismatch(
            format!("{params_cnt} params"),
            format!("{} params in entry {}", bad.params.len(), bad.name),
        ));
    }
    Ok(entries)
}

impl BatchSource for FaceDataset {
    fn get_batch(&mut self, batch_size: usize, split: Split) -> Result<FaceBatch> {
        let count = self.len(split);
        if count == 0 {
            return Err(DataError::empty_split(split.name()));
        }

        let mut names = Vec::with_capacity(batch_size);
        let mut params = Vec::with_capacity(batch_size * self.params_cnt);
        let mut images = Vec::new();
        for _ in 0..batch_size {
            let index = self.rng.gen_range(0..count);
            let entry = &self.entries(split)[index];
            images.extend(self.load_image(split, &entry.name)?);
            params.extend_from_slice(&entry.params);
            names.push(entry.name.clone());
        }

        FaceBatch::new(names, params, images, self.params_cnt, self.image_size)
    }

    fn params_cnt(&self) -> usize {
        self.params_cnt
    }

    fn image_size(&self) -> usize {
        self.image_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_split(root: &Path, split: Split, names: &[&str], params_cnt: usize) {
        let dir = root.join(split.name());
        std::fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("{e}"));
        let entries: Vec<ManifestEntry> = names
            .iter()
            .map(|name| ManifestEntry {
                name: (*name).to_string(),
                params: vec![0.5; params_cnt],
            })
            .collect();
        let json = serde_json::to_string(&entries).unwrap_or_default();
        std::fs::write(dir.join(MANIFEST_FILE), json).unwrap_or_else(|e| panic!("{e}"));
        for name in names {
            let img = image::RgbImage::from_pixel(16, 16, image::Rgb([255, 0, 51]));
            img.save(dir.join(format!("{name}.png")))
                .unwrap_or_else(|e| panic!("{e}"));
        }
    }

    #[test]
    fn open_missing_splits_is_empty() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let dataset = FaceDataset::open(dir.path(), 95, 8, Some(0));
        assert!(dataset.is_ok());
        let mut dataset = dataset.unwrap_or_else(|e| panic!("{e}"));
        assert!(dataset.is_empty());
        assert!(matches!(
            dataset.get_batch(1, Split::Train),
            Err(DataError::EmptySplit(_))
        ));
    }

    #[test]
    fn loads_and_resizes_images() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        write_split(dir.path(), Split::Train, &["a", "b"], 95);

        let mut dataset =
            FaceDataset::open(dir.path(), 95, 8, Some(3)).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(dataset.len(Split::Train), 2);

        let batch = dataset
            .get_batch(3, Split::Train)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(batch.images_shape(), [3, 3, 8, 8]);
        let first = batch.image(0).unwrap_or_default();
        assert!((first[0] - 1.0).abs() < 1e-6);
        assert!(first[64].abs() < 1e-6);
        assert!((first[128] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_param_count() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        write_split(dir.path(), Split::Test, &["a"], 90);
        let result = FaceDataset::open(dir.path(), 95, 8, None);
        assert!(matches!(result, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn missing_image_is_reported() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        write_split(dir.path(), Split::Train, &["a"], 95);
        std::fs::remove_file(dir.path().join("train").join("a.png"))
            .unwrap_or_else(|e| panic!("{e}"));

        let mut dataset =
            FaceDataset::open(dir.path(), 95, 8, Some(0)).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            dataset.get_batch(1, Split::Train),
            Err(DataError::Image { .. })
        ));
    }
}

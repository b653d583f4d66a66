//! Run metrics and metric sinks.
//!
//! [`RunReport`] accumulates per-step records for the caller;
//! a [`MetricsSink`] receives the same values as tagged events while the
//! run is in progress.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use imitator_model::WeightImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

/// Tag of the per-step loss scalar.
pub const LOSS_TAG: &str = "imitator/loss";

/// Tag of the learning-rate scalar emitted at each decay.
pub const LEARNING_RATE_TAG: &str = "imitator/learning_rate";

/// Tag of the network structure summary.
pub const GRAPH_TAG: &str = "imitator/graph";

/// Name of the event log inside a [`JsonlSink`] directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Metrics for a single training step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Step index.
    pub step: usize,

    /// L1 loss of the step.
    pub loss: f32,

    /// Learning rate the step was taken with.
    pub learning_rate: f64,
}

impl StepMetrics {
    /// Creates step metrics.
    #[must_use]
    pub const fn new(step: usize, loss: f32, learning_rate: f64) -> Self {
        Self {
            step,
            loss,
            learning_rate,
        }
    }
}

/// Outcome of a training run.
///
/// # Example
///
/// ```
/// use imitator_training::{StepMetrics, RunReport};
///
/// let mut metrics = RunReport::new();
/// metrics.add_step(StepMetrics::new(0, 0.5, 1e-3));
/// metrics.add_step(StepMetrics::new(1, 0.25, 1e-3));
///
/// assert_eq!(metrics.steps_completed(), 2);
/// assert!((metrics.loss_improvement() - 0.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Metrics for each step, in order.
    pub step_metrics: Vec<StepMetrics>,

    /// Preview images written.
    pub previews: Vec<PathBuf>,

    /// Checkpoints written.
    pub checkpoints: Vec<PathBuf>,
}

impl RunReport {
    /// Creates new empty training metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds metrics for a step.
    pub fn add_step(&mut self, metrics: StepMetrics) {
        self.step_metrics.push(metrics);
    }

    /// Returns the number of completed steps.
    #[must_use]
    pub fn steps_completed(&self) -> usize {
        self.step_metrics.len()
    }

    /// Returns the first step index of the run.
    #[must_use]
    pub fn first_step(&self) -> Option<usize> {
        self.step_metrics.first().map(|m| m.step)
    }

    /// Returns the last step index of the run.
    #[must_use]
    pub fn last_step(&self) -> Option<usize> {
        self.step_metrics.last().map(|m| m.step)
    }

    /// Returns the final training loss.
    #[must_use]
    pub fn final_loss(&self) -> f32 {
        self.step_metrics.last().map_or(f32::NAN, |m| m.loss)
    }

    /// Returns the learning rate the last step was taken with.
    #[must_use]
    pub fn final_learning_rate(&self) -> Option<f64> {
        self.step_metrics.last().map(|m| m.learning_rate)
    }

    /// Returns the initial training loss.
    #[must_use]
    pub fn initial_loss(&self) -> f32 {
        self.step_metrics.first().map_or(f32::NAN, |m| m.loss)
    }

    /// Returns the loss improvement ratio.
    #[must_use]
    pub fn loss_improvement(&self) -> f32 {
        let initial = self.initial_loss();
        let final_loss = self.final_loss();
        if initial > 0.0 && !initial.is_nan() && !final_loss.is_nan() {
            1.0 - (final_loss / initial)
        } else {
            0.0
        }
    }

    /// Returns training losses as a vector.
    #[must_use]
    pub fn losses(&self) -> Vec<f32> {
        self.step_metrics.iter().map(|m| m.loss).collect()
    }

    /// Returns learning rates as a vector.
    #[must_use]
    pub fn learning_rates(&self) -> Vec<f64> {
        self.step_metrics.iter().map(|m| m.learning_rate).collect()
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = writeln!(s, "Training Summary");
        let _ = writeln!(s, "================");
        let _ = writeln!(s, "Steps completed: {}", self.steps_completed());
        let _ = writeln!(
            s,
            "Initial loss: {:.4} -> Final loss: {:.4}",
            self.initial_loss(),
            self.final_loss()
        );
        let _ = writeln!(s, "Improvement: {:.1}%", self.loss_improvement() * 100.0);
        let _ = writeln!(s, "Previews: {}", self.previews.len());
        let _ = writeln!(s, "Checkpoints: {}", self.checkpoints.len());
        if let Some(last) = self.checkpoints.last() {
            let _ = writeln!(s, "Last checkpoint: {}", last.display());
        }
        s
    }
}

/// A single event as stored by a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Scalar value at a step.
    Scalar {
        /// Metric tag.
        tag: String,
        /// Value.
        value: f64,
        /// Step index.
        step: usize,
    },

    /// Grayscale image at a step.
    Image {
        /// Metric tag.
        tag: String,
        /// Step index.
        step: usize,
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Where the image was written, if anywhere.
        path: Option<PathBuf>,
    },

    /// Free-form text, e.g. the network structure.
    Summary {
        /// Metric tag.
        tag: String,
        /// Text body.
        text: String,
    },
}

impl MetricEvent {
    /// Returns the event tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Scalar { tag, .. } | Self::Image { tag, .. } | Self::Summary { tag, .. } => tag,
        }
    }
}

/// Destination for tagged training metrics.
pub trait MetricsSink {
    /// Records a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Metrics`] if the event cannot be stored.
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;

    /// Records a grayscale image.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Metrics`] if the event cannot be stored.
    fn add_image(&mut self, tag: &str, image: &WeightImage, step: usize) -> Result<()>;

    /// Records a text summary.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Metrics`] if the event cannot be stored.
    fn add_summary(&mut self, tag: &str, text: &str) -> Result<()>;

    /// Flushes buffered events.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Metrics`] if flushing fails.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Vec<MetricEvent>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    #[must_use]
    pub fn events(&self) -> &[MetricEvent] {
        &self.events
    }

    /// `(step, value)` pairs recorded under `tag`.
    #[must_use]
    pub fn scalars(&self, tag: &str) -> Vec<(usize, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Scalar {
                    tag: t,
                    value,
                    step,
                } if t == tag => Some((*step, *value)),
                _ => None,
            })
            .collect()
    }

    /// Number of image events.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MetricEvent::Image { .. }))
            .count()
    }

    /// Number of summary events.
    #[must_use]
    pub fn summary_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MetricEvent::Summary { .. }))
            .count()
    }
}

impl MetricsSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        self.events.push(MetricEvent::Scalar {
            tag: tag.to_string(),
            value,
            step,
        });
        Ok(())
    }

    fn add_image(&mut self, tag: &str, image: &WeightImage, step: usize) -> Result<()> {
        self.events.push(MetricEvent::Image {
            tag: tag.to_string(),
            step,
            width: image.width,
            height: image.height,
            path: None,
        });
        Ok(())
    }

    fn add_summary(&mut self, tag: &str, text: &str) -> Result<()> {
        self.events.push(MetricEvent::Summary {
            tag: tag.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Sink writing one JSON event per line, with images as PNG files.
///
/// Layout:
///
/// ```text
/// <dir>/events.jsonl
/// <dir>/images/<tag>_<step>.png
/// ```
#[derive(Debug)]
pub struct JsonlSink {
    dir: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Opens (appending) the event log under `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Metrics`] if the directory or file cannot be
    /// created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| TrainingError::metrics(format!("creating {}: {e}", dir.display())))?;
        let path = dir.join(EVENTS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TrainingError::metrics(format!("opening {}: {e}", path.display())))?;
        Ok(Self {
            dir,
            writer: BufWriter::new(file),
        })
    }

    /// Directory this sink writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_event(&mut self, event: &MetricEvent) -> Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| TrainingError::metrics(format!("encoding event: {e}")))?;
        writeln!(self.writer, "{line}")
            .map_err(|e| TrainingError::metrics(format!("writing event: {e}")))
    }

    fn image_path(&self, tag: &str, step: usize) -> PathBuf {
        let stem: String = tag
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join("images").join(format!("{stem}_{step}.png"))
    }
}

impl MetricsSink for JsonlSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        self.write_event(&MetricEvent::Scalar {
            tag: tag.to_string(),
            value,
            step,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_image(&mut self, tag: &str, image: &WeightImage, step: usize) -> Result<()> {
        let path = self.image_path(tag, step);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrainingError::metrics(format!("creating {}: {e}", parent.display())))?;
        }
        let gray = image::GrayImage::from_raw(
            image.width as u32,
            image.height as u32,
            image.pixels.clone(),
        )
        .ok_or_else(|| {
            TrainingError::metrics(format!(
                "{}: {} pixels do not fill {}x{}",
                image.name,
                image.pixels.len(),
                image.width,
                image.height
            ))
        })?;
        gray.save(&path)
            .map_err(|e| TrainingError::metrics(format!("writing {}: {e}", path.display())))?;

        self.write_event(&MetricEvent::Image {
            tag: tag.to_string(),
            step,
            width: image.width,
            height: image.height,
            path: Some(path),
        })
    }

    fn add_summary(&mut self, tag: &str, text: &str) -> Result<()> {
        self.write_event(&MetricEvent::Summary {
            tag: tag.to_string(),
            text: text.to_string(),
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TrainingError::metrics(format!("flushing events: {e}")))
    }
}

//! The imitator: network, optimizer and the training loop around them.

use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::record::Record;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use imitator_data::{BatchSource, FaceBatch, Split};
use imitator_model::{
    BackendType, ImitatorNetwork, Mode, NetworkRecord, checkpoint_path, load_record,
    params_from_slice, save_record,
};
use tracing::{debug, info, warn};

use crate::artifacts::clear_dir;
use crate::config::{TrainingConfig, decayed_learning_rate};
use crate::error::{Result, TrainingError};
use crate::loss::l1_loss;
use crate::metrics::{
    GRAPH_TAG, LEARNING_RATE_TAG, LOSS_TAG, MetricsSink, RunReport, StepMetrics,
};
use crate::preview::{preview_path, write_preview};

/// Everything needed to resume a run: weights, optimizer moments, the
/// learning rate in effect and the step the snapshot was taken after.
#[derive(Record)]
pub struct ImitatorCheckpoint<B: Backend, O: Record<B>> {
    /// Network weights.
    pub network: NetworkRecord<B>,

    /// Optimizer state.
    pub optimizer: O,

    /// Step index the snapshot was taken after.
    pub step: usize,

    /// Learning rate fed to the optimizer when the snapshot was taken.
    pub learning_rate: f64,
}

/// Trains an [`ImitatorNetwork`] against a rendering engine's output.
///
/// Owns the network, the optimizer and the learning rate in effect; the
/// [`TrainingConfig`] is fixed at construction.
///
/// # Example
///
/// ```ignore
/// let config = TrainingConfig::new(10_000);
/// let optimizer = config.optimizer.init();
/// let mut imitator = Imitator::<Autodiff<NdArray>, _>::new(config, optimizer, &device)?;
///
/// imitator.reset_artifacts()?;
/// let mut sink = JsonlSink::open(&imitator.config().path_tensor_log)?;
/// let report = imitator.batch_train(&mut faces, &mut sink)?;
/// let accuracy = imitator.evaluate(&mut faces)?;
/// ```
pub struct Imitator<B: AutodiffBackend, O> {
    config: TrainingConfig,
    network: ImitatorNetwork<B>,
    optimizer: O,
    learning_rate: f64,
    initial_step: usize,
    restored: bool,
    device: B::Device,
}

impl<B, O> Imitator<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<ImitatorNetwork<B>, B> + Clone,
{
    /// Creates an imitator with a freshly initialized network.
    ///
    /// Nothing on disk is touched; see [`reset_artifacts`](Self::reset_artifacts).
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] if the configuration is
    /// invalid.
    pub fn new(config: TrainingConfig, optimizer: O, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let network = ImitatorNetwork::new(&config.model, device)?;
        info!(
            params_cnt = config.params_cnt(),
            image_size = network.image_size(),
            batch_size = config.batch_size,
            learning_rate = config.learning_rate,
            "Created imitator"
        );
        Ok(Self {
            learning_rate: config.learning_rate,
            config,
            network,
            optimizer,
            initial_step: 0,
            restored: false,
            device: device.clone(),
        })
    }

    /// Returns the training configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Returns the network.
    #[must_use]
    pub const fn network(&self) -> &ImitatorNetwork<B> {
        &self.network
    }

    /// Returns the learning rate currently fed to the optimizer.
    #[must_use]
    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Returns the step restored from the last loaded checkpoint, or 0.
    #[must_use]
    pub const fn initial_step(&self) -> usize {
        self.initial_step
    }

    /// First step index the next [`batch_train`](Self::batch_train) runs.
    #[must_use]
    pub const fn first_step(&self) -> usize {
        if self.restored {
            self.initial_step + 1
        } else {
            self.initial_step
        }
    }

    /// Runs one optimization step on a batch.
    ///
    /// Returns the batch loss and the (detached) generated images.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::ShapeMismatch`] if `params` is not
    /// `[batch, params_cnt]` or `reference` does not match the output shape.
    pub fn train_step(
        &mut self,
        params: Tensor<B, 2>,
        reference: Tensor<B, 4>,
    ) -> Result<(f32, Tensor<B, 4>)> {
        let generated = self.network.forward(params, Mode::Train)?;
        let loss = l1_loss(generated.clone(), reference)?;
        let value = loss.clone().into_scalar().elem::<f32>();
        if !value.is_finite() {
            warn!(loss = value, "Non-finite training loss");
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        self.network = self
            .optimizer
            .step(self.learning_rate, self.network.clone(), grads);
        Ok((value, generated.detach()))
    }

    /// Trains from [`first_step`](Self::first_step) through `total_steps`
    /// inclusive.
    ///
    /// After step `s` a preview is written and the learning rate decays when
    /// `(s + 1) % prev_freq == 0`, and a checkpoint is saved when
    /// `(s + 1) % save_freq == 0`.
    ///
    /// # Errors
    ///
    /// Fails on the first dataset, shape, metrics or checkpoint error; the
    /// checkpoints written before the failure remain on disk.
    pub fn batch_train<D, S>(&mut self, data: &mut D, sink: &mut S) -> Result<RunReport>
    where
        D: BatchSource + ?Sized,
        S: MetricsSink + ?Sized,
    {
        self.check_source(data)?;
        let first = self.first_step();
        let total = self.config.total_steps;
        info!(
            first_step = first,
            total_steps = total,
            batch_size = self.config.batch_size,
            "Starting imitator training"
        );
        sink.add_summary(GRAPH_TAG, &self.network.describe())?;

        let mut report = RunReport::new();
        for step in first..=total {
            let batch = data.get_batch(self.config.batch_size, Split::Train)?;
            let (params, reference) = batch_tensors::<B>(&batch, &self.device)?;
            let (loss, generated) = self.train_step(params, reference.clone())?;
            sink.add_scalar(LOSS_TAG, f64::from(loss), step)?;
            debug!(step, loss, learning_rate = self.learning_rate, "Training step");
            report.add_step(StepMetrics::new(step, loss, self.learning_rate));

            if self.config.should_preview(step) {
                let path = preview_path(&self.config.preview_dir, step);
                report.previews.push(write_preview(&path, reference, generated)?);
                self.decay_learning_rate(step);
                sink.add_scalar(LEARNING_RATE_TAG, self.learning_rate, step)?;
                self.upload_weights(sink, step)?;
                info!(step, loss, learning_rate = self.learning_rate, "Preview");
            }
            if self.config.should_checkpoint(step) {
                report.checkpoints.push(self.save(step)?);
            }
        }
        sink.flush()?;

        info!(
            steps = report.steps_completed(),
            final_loss = report.final_loss(),
            checkpoints = report.checkpoints.len(),
            "Finished imitator training"
        );
        Ok(report)
    }

    /// Writes `{network, optimizer, step, learning_rate}` to
    /// `<model_dir>/model_imitator_<step+1>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Io`] if the directory or file cannot be
    /// written.
    pub fn save(&self, step: usize) -> Result<PathBuf> {
        let dir = &self.config.model_dir;
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Creating checkpoint directory");
            std::fs::create_dir_all(dir)
                .map_err(|e| TrainingError::io(format!("creating {}: {e}", dir.display())))?;
        }
        let format = self.config.checkpoint_format;
        let record = ImitatorCheckpoint {
            network: self.network.clone().into_record(),
            optimizer: self.optimizer.to_record(),
            step,
            learning_rate: self.learning_rate,
        };
        let path = save_record::<B, _>(record, &checkpoint_path(dir, step, format), format)?;
        info!(step, path = %path.display(), %format, "Saved checkpoint");
        Ok(path)
    }

    /// Restores network, optimizer and learning rate from a checkpoint.
    ///
    /// `path` is resolved against `path_to_inference`. Returns the restored
    /// step; the next [`batch_train`](Self::batch_train) continues at the
    /// step after it.
    ///
    /// # Errors
    ///
    /// - [`TrainingError::AcceleratorUnavailable`] if `use_accelerator` is
    ///   set and `B` is not an accelerator backend
    /// - [`TrainingError::Io`] if the file does not exist
    /// - [`TrainingError::Deserialization`] if the stored structure does not
    ///   match this network; nothing is restored in that case
    pub fn load(&mut self, path: impl AsRef<Path>, use_accelerator: bool) -> Result<usize> {
        let backend = BackendType::select_for::<B>(use_accelerator)?;
        let full_path = self.config.path_to_inference.join(path);
        let checkpoint: ImitatorCheckpoint<B, O::Record> =
            load_record::<B, _>(&full_path, &self.device)?;

        let network = self
            .network
            .clone()
            .load_checked(checkpoint.network, &full_path.display().to_string())?;
        self.optimizer = self.optimizer.clone().load_record(checkpoint.optimizer);
        self.network = network;
        self.learning_rate = checkpoint.learning_rate;
        self.initial_step = checkpoint.step;
        self.restored = true;

        info!(
            path = %full_path.display(),
            step = checkpoint.step,
            learning_rate = self.learning_rate,
            %backend,
            "Loaded checkpoint"
        );
        Ok(checkpoint.step)
    }

    /// Loads a checkpoint and continues training after its step.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and [`batch_train`](Self::batch_train).
    pub fn resume<D, S>(
        &mut self,
        path: impl AsRef<Path>,
        use_accelerator: bool,
        data: &mut D,
        sink: &mut S,
    ) -> Result<RunReport>
    where
        D: BatchSource + ?Sized,
        S: MetricsSink + ?Sized,
    {
        self.load(path, use_accelerator)?;
        self.batch_train(data, sink)
    }

    /// Loads a checkpoint and renders `params` in [`Mode::Eval`].
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load); also [`TrainingError::ShapeMismatch`] for
    /// malformed parameters.
    pub fn inference(
        &mut self,
        path: impl AsRef<Path>,
        params: Tensor<B::InnerBackend, 2>,
        use_accelerator: bool,
    ) -> Result<Tensor<B::InnerBackend, 4>> {
        self.load(path, use_accelerator)?;
        Ok(self.network.valid().forward(params, Mode::Eval)?)
    }

    /// Mean of `1 - loss` over `eval_steps` held-out batches.
    ///
    /// Runs on the non-differentiable backend in [`Mode::Eval`]; weights and
    /// optimizer state are left untouched.
    ///
    /// # Errors
    ///
    /// Fails on dataset or shape errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate<D>(&self, data: &mut D) -> Result<f32>
    where
        D: BatchSource + ?Sized,
    {
        self.check_source(data)?;
        let network = self.network.valid();
        let steps = self.config.eval_steps;
        let mut accuracy = 0.0_f32;
        for _ in 0..steps {
            let batch = data.get_batch(self.config.batch_size, Split::Test)?;
            let (params, reference) = batch_tensors::<B::InnerBackend>(&batch, &self.device)?;
            let generated = network.forward(params, Mode::Eval)?;
            let loss = l1_loss(generated, reference)?.into_scalar().elem::<f32>();
            accuracy += 1.0 - loss;
        }
        let accuracy = accuracy / steps as f32;
        info!(steps, accuracy, "Evaluated imitator");
        Ok(accuracy)
    }

    /// Empties the log, preview and model directories.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Io`] if a directory cannot be cleared.
    pub fn reset_artifacts(&self) -> Result<()> {
        for dir in [
            &self.config.path_tensor_log,
            &self.config.preview_dir,
            &self.config.model_dir,
        ] {
            clear_dir(dir)?;
        }
        Ok(())
    }

    fn decay_learning_rate(&mut self, step: usize) {
        let decayed =
            decayed_learning_rate(self.config.learning_rate, step, self.config.total_steps);
        self.learning_rate = decayed.min(self.learning_rate);
    }

    fn upload_weights<S: MetricsSink + ?Sized>(&self, sink: &mut S, step: usize) -> Result<()> {
        for layer in self.network.inspectable_layers() {
            let image = layer.snapshot()?;
            sink.add_image(&format!("imitator/weight_{}", layer.name), &image, step)?;
        }
        Ok(())
    }

    fn check_source<D: BatchSource + ?Sized>(&self, data: &D) -> Result<()> {
        let expected = (self.network.params_cnt(), self.network.image_size());
        let actual = (data.params_cnt(), data.image_size());
        if expected == actual {
            Ok(())
        } else {
            Err(TrainingError::shape_mismatch(
                format!("{} params, {}px images", expected.0, expected.1),
                format!("{} params, {}px images", actual.0, actual.1),
            ))
        }
    }
}

/// Converts a batch into `[B, params_cnt]` parameters and
/// `[B, 3, size, size]` reference images.
fn batch_tensors<BK: Backend>(
    batch: &FaceBatch,
    device: &BK::Device,
) -> Result<(Tensor<BK, 2>, Tensor<BK, 4>)> {
    batch.validate()?;
    let params = params_from_slice::<BK>(&batch.params, batch.batch_size, batch.params_cnt, device)?;
    let images = Tensor::from_data(
        TensorData::new(batch.images.clone(), batch.images_shape()),
        device,
    );
    Ok((params, images))
}

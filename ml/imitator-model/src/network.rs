//! Upsampling network that turns a parameter vector into a face image.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::Backend;
use burn::tensor::activation::relu;
use burn::tensor::{Distribution, Tensor};
use tracing::debug;

use crate::adapter::adapt;
use crate::config::{ImitatorConfig, Mode};
use crate::error::{ModelError, Result};
use crate::registry::InspectableLayer;

/// Record type persisted for an [`ImitatorNetwork`].
pub type NetworkRecord<B> = <ImitatorNetwork<B> as Module<B>>::Record;

/// Residual unit: conv3x3 -> `ReLU` -> conv3x3 -> skip add -> `ReLU`.
#[derive(Debug, Module)]
pub struct ResidualUnit<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> ResidualUnit<B> {
    fn new(channels: usize, init: &Initializer, device: &B::Device) -> Self {
        let conv = || {
            Conv2dConfig::new([channels, channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .with_initializer(init.clone())
                .init(device)
        };
        Self {
            conv1: conv(),
            conv2: conv(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = x.clone();
        let y = relu(self.conv1.forward(x));
        let y = self.conv2.forward(y);
        relu(y + residual)
    }
}

/// Parameter-to-image generator.
///
/// Architecture, for the default widths:
///
/// ```text
/// [B, 95, 1, 1]
///   head      deconv k4 s1      -> [B, 512, 4, 4]
///   residual  2 units           -> [B, 512, 4, 4]
///   upsample  6 x deconv k4 s2  -> [B, 64, 256, 256]
///   output    deconv k4 s2      -> [B, 3, 512, 512]
///   dropout (train only), tanh, (y + 1) / 2
/// ```
#[derive(Debug, Module)]
pub struct ImitatorNetwork<B: Backend> {
    head: ConvTranspose2d<B>,
    residual: Vec<ResidualUnit<B>>,
    upsample: Vec<ConvTranspose2d<B>>,
    output: ConvTranspose2d<B>,
    params_cnt: usize,
    dropout: f64,
}

impl<B: Backend> ImitatorNetwork<B> {
    /// Creates a network with freshly initialized weights.
    ///
    /// Every convolution is drawn from `Normal(0, init_std)`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: &ImitatorConfig, device: &B::Device) -> Result<Self> {
        if !config.is_valid() {
            return Err(ModelError::invalid_config(format!("{config:?}")));
        }
        let init = Initializer::Normal {
            mean: 0.0,
            std: config.init_std,
        };
        let deconv = |channels: [usize; 2], stride: usize, padding: usize| {
            ConvTranspose2dConfig::new(channels, [4, 4])
                .with_stride([stride, stride])
                .with_padding([padding, padding])
                .with_initializer(init.clone())
                .init(device)
        };

        let width = config.channels[0];
        let head = deconv([config.params_cnt, width], 1, 0);
        let residual = (0..config.residual_units)
            .map(|_| ResidualUnit::new(width, &init, device))
            .collect();
        let upsample = config
            .channels
            .windows(2)
            .map(|pair| deconv([pair[0], pair[1]], 2, 1))
            .collect();
        let last = config.channels[config.channels.len() - 1];
        let output = deconv([last, config.out_channels], 2, 1);

        Ok(Self {
            head,
            residual,
            upsample,
            output,
            params_cnt: config.params_cnt,
            dropout: config.dropout,
        })
    }

    /// Returns the expected parameter vector length.
    #[must_use]
    pub const fn params_cnt(&self) -> usize {
        self.params_cnt
    }

    /// Returns the generated image side length.
    #[must_use]
    pub fn image_size(&self) -> usize {
        4 << (self.upsample.len() + 1)
    }

    /// Renders `[batch, params_cnt]` parameters in `[0, 1]` to
    /// `[batch, 3, size, size]` images in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the parameter length is wrong.
    pub fn forward(&self, params: Tensor<B, 2>, mode: Mode) -> Result<Tensor<B, 4>> {
        let input = adapt(params, self.params_cnt)?;
        self.forward_adapted(input, mode)
    }

    /// Runs the stack on an already adapted `[batch, params_cnt, 1, 1]` input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] for any other input shape.
    pub fn forward_adapted(&self, input: Tensor<B, 4>, mode: Mode) -> Result<Tensor<B, 4>> {
        let [batch, channels, height, width] = input.dims();
        if channels != self.params_cnt || height != 1 || width != 1 {
            return Err(ModelError::shape_mismatch(
                format!("[{batch}, {}, 1, 1]", self.params_cnt),
                format!("[{batch}, {channels}, {height}, {width}]"),
            ));
        }
        let mut x = relu(self.head.forward(input));
        for unit in &self.residual {
            x = unit.forward(x);
        }
        for stage in &self.upsample {
            x = relu(stage.forward(x));
        }
        let raw = self.output.forward(x);
        let raw = if mode.is_train() {
            self.drop_out(raw)
        } else {
            raw
        };
        Ok(raw.tanh().add_scalar(1.0).mul_scalar(0.5))
    }

    /// Inverted dropout: zeroes activations with probability `p` and scales
    /// the survivors by `1 / (1 - p)`.
    fn drop_out(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.dropout <= 0.0 {
            return x;
        }
        let keep = 1.0 - self.dropout;
        let mask = Tensor::<B, 4>::random(x.shape(), Distribution::Bernoulli(keep), &x.device());
        x.mul(mask).div_scalar(keep)
    }

    /// Shapes of every weight tensor, in forward order.
    #[must_use]
    pub fn weight_shapes(&self) -> Vec<[usize; 4]> {
        let mut shapes = vec![self.head.weight.val().dims()];
        for unit in &self.residual {
            shapes.push(unit.conv1.weight.val().dims());
            shapes.push(unit.conv2.weight.val().dims());
        }
        shapes.extend(self.upsample.iter().map(|stage| stage.weight.val().dims()));
        shapes.push(self.output.weight.val().dims());
        shapes
    }

    /// Loads `record`, rejecting weights shaped for a different network.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Deserialization`] naming `source` if any weight
    /// shape differs from this network's.
    pub fn load_checked(self, record: NetworkRecord<B>, source: &str) -> Result<Self> {
        let expected = self.weight_shapes();
        let loaded = self.load_record(record);
        let found = loaded.weight_shapes();
        if found != expected {
            return Err(ModelError::deserialization(
                source,
                format!("weight shapes {found:?} do not match network {expected:?}"),
            ));
        }
        Ok(loaded)
    }

    /// Layers whose weights are exported as diagnostic snapshots.
    ///
    /// The list is fixed at construction: the head, the last upsampling
    /// stage and the output stage.
    #[must_use]
    pub fn inspectable_layers(&self) -> Vec<InspectableLayer<B>> {
        let mut layers = vec![InspectableLayer::new("head", self.head.weight.val())];
        if let Some(stage) = self.upsample.last() {
            layers.push(InspectableLayer::new(
                format!("upsample_{}", self.upsample.len()),
                stage.weight.val(),
            ));
        }
        layers.push(InspectableLayer::new("output", self.output.weight.val()));
        layers
    }

    /// Returns a structural summary of the network.
    #[must_use]
    pub fn describe(&self) -> String {
        use std::fmt::Write;

        let channels = |layer: &ConvTranspose2d<B>| {
            let [c_in, c_out, _, _] = layer.weight.val().dims();
            (c_in, c_out)
        };
        let mut s = String::new();
        let mut size = 4;
        let (c_in, c_out) = channels(&self.head);
        let _ = writeln!(s, "head       deconv {c_in:>4} -> {c_out:<4} {size}x{size}");
        for (i, _) in self.residual.iter().enumerate() {
            let _ = writeln!(s, "residual_{i} conv3x3 x2 {c_out:>4}      {size}x{size}");
        }
        for (i, stage) in self.upsample.iter().enumerate() {
            size *= 2;
            let (c_in, c_out) = channels(stage);
            let _ = writeln!(
                s,
                "upsample_{} deconv {c_in:>4} -> {c_out:<4} {size}x{size}",
                i + 1
            );
        }
        size *= 2;
        let (c_in, c_out) = channels(&self.output);
        let _ = writeln!(s, "output     deconv {c_in:>4} -> {c_out:<4} {size}x{size}");
        let _ = write!(s, "parameters {}", self.num_params());
        debug!(params = self.num_params(), "Described imitator network");
        s
    }
}

//! Shuffle CNN variants
//!
//! The other two members of the supported-architecture set: a stem
//! convolution followed by three stages of channel-split units with channel
//! shuffling, a 1x1 head convolution, global pooling and a linear
//! classifier. `shuffle_dw` runs each unit's spatial convolution depthwise;
//! `shuffle_vw` runs it full-width over the branch channels.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::config::{scaled_channels, EvalConfig};
use super::ImageClassifier;

/// Stem channel count before width scaling
const STEM_FILTERS: usize = 24;

/// Per-stage output channel counts before width scaling
const STAGE_FILTERS: [usize; 3] = [116, 232, 464];

/// Units per stage (first unit of each stage downsamples)
const STAGE_REPEATS: [usize; 3] = [4, 8, 4];

/// Head channel count before width scaling
const HEAD_FILTERS: usize = 1024;

/// Configuration for the shuffle CNN variants
#[derive(Config, Debug)]
pub struct ShuffleNetConfig {
    /// Number of output classes
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Input image height
    #[config(default = "224")]
    pub height: usize,

    /// Input image width
    #[config(default = "224")]
    pub width: usize,

    /// Channel width scaling factor
    #[config(default = "1.0")]
    pub width_scale: f64,

    /// Use depthwise spatial convolutions inside the units
    #[config(default = "true")]
    pub depthwise: bool,
}

impl ShuffleNetConfig {
    /// Derive the network configuration from an evaluation config.
    pub fn from_eval(config: &EvalConfig, depthwise: bool) -> Self {
        Self::new()
            .with_num_classes(config.num_classes)
            .with_in_channels(config.channels)
            .with_height(config.model_height)
            .with_width(config.model_width)
            .with_width_scale(config.width_scale)
            .with_depthwise(depthwise)
    }
}

/// Interleave the channels of the two concatenated branches.
fn channel_shuffle<B: Backend>(x: Tensor<B, 4>, groups: usize) -> Tensor<B, 4> {
    let [batch, channels, height, width] = x.dims();
    let x: Tensor<B, 5> = x.reshape([batch, groups, channels / groups, height, width]);
    x.swap_dims(1, 2).reshape([batch, channels, height, width])
}

/// Spatial halving for a 3x3 stride-2 convolution with padding 1.
fn half(n: usize) -> usize {
    (n + 1) / 2
}

/// The 3x3 spatial convolution of a unit: depthwise or full-width.
fn spatial_conv<B: Backend>(
    channels: usize,
    stride: usize,
    depthwise: bool,
    device: &B::Device,
) -> Conv2d<B> {
    let groups = if depthwise { channels } else { 1 };
    Conv2dConfig::new([channels, channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_groups(groups)
        .init(device)
}

fn spatial_conv_macs(h_out: usize, w_out: usize, channels: usize, depthwise: bool) -> usize {
    if depthwise {
        h_out * w_out * channels * 9
    } else {
        h_out * w_out * channels * channels * 9
    }
}

/// Stride-1 unit: the left channel half passes through untouched, the right
/// half runs 1x1 -> 3x3 -> 1x1, then both halves are shuffled together.
#[derive(Module, Debug)]
pub struct ShuffleUnit<B: Backend> {
    pw1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    mid: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    pw2: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> ShuffleUnit<B> {
    fn new(channels: usize, depthwise: bool, device: &B::Device) -> Self {
        let branch = channels / 2;

        Self {
            pw1: Conv2dConfig::new([branch, branch], [1, 1]).init(device),
            bn1: BatchNormConfig::new(branch).init(device),
            mid: spatial_conv(branch, 1, depthwise, device),
            bn2: BatchNormConfig::new(branch).init(device),
            pw2: Conv2dConfig::new([branch, branch], [1, 1]).init(device),
            bn3: BatchNormConfig::new(branch).init(device),
            relu: Relu::new(),
        }
    }

    fn macs(height: usize, width: usize, channels: usize, depthwise: bool) -> usize {
        let branch = channels / 2;
        2 * height * width * branch * branch + spatial_conv_macs(height, width, branch, depthwise)
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let branch_width = channels / 2;

        let shortcut = x.clone().narrow(1, 0, branch_width);
        let branch = x.narrow(1, branch_width, branch_width);

        let branch = self.relu.forward(self.bn1.forward(self.pw1.forward(branch)));
        let branch = self.bn2.forward(self.mid.forward(branch));
        let branch = self.relu.forward(self.bn3.forward(self.pw2.forward(branch)));

        channel_shuffle(Tensor::cat(vec![shortcut, branch], 1), 2)
    }
}

/// Stride-2 unit: both branches see the full input; their concatenation
/// doubles the channel count while halving the spatial resolution.
#[derive(Module, Debug)]
pub struct DownsampleUnit<B: Backend> {
    left_mid: Conv2d<B>,
    left_bn1: BatchNorm<B, 2>,
    left_pw: Conv2d<B>,
    left_bn2: BatchNorm<B, 2>,

    right_pw1: Conv2d<B>,
    right_bn1: BatchNorm<B, 2>,
    right_mid: Conv2d<B>,
    right_bn2: BatchNorm<B, 2>,
    right_pw2: Conv2d<B>,
    right_bn3: BatchNorm<B, 2>,

    relu: Relu,
}

impl<B: Backend> DownsampleUnit<B> {
    fn new(in_channels: usize, out_channels: usize, depthwise: bool, device: &B::Device) -> Self {
        let branch = out_channels / 2;

        Self {
            left_mid: spatial_conv(in_channels, 2, depthwise, device),
            left_bn1: BatchNormConfig::new(in_channels).init(device),
            left_pw: Conv2dConfig::new([in_channels, branch], [1, 1]).init(device),
            left_bn2: BatchNormConfig::new(branch).init(device),

            right_pw1: Conv2dConfig::new([in_channels, branch], [1, 1]).init(device),
            right_bn1: BatchNormConfig::new(branch).init(device),
            right_mid: spatial_conv(branch, 2, depthwise, device),
            right_bn2: BatchNormConfig::new(branch).init(device),
            right_pw2: Conv2dConfig::new([branch, branch], [1, 1]).init(device),
            right_bn3: BatchNormConfig::new(branch).init(device),

            relu: Relu::new(),
        }
    }

    fn macs(
        height: usize,
        width: usize,
        in_channels: usize,
        out_channels: usize,
        depthwise: bool,
    ) -> usize {
        let branch = out_channels / 2;
        let (h_out, w_out) = (half(height), half(width));

        let left = spatial_conv_macs(h_out, w_out, in_channels, depthwise)
            + h_out * w_out * in_channels * branch;
        let right = height * width * in_channels * branch
            + spatial_conv_macs(h_out, w_out, branch, depthwise)
            + h_out * w_out * branch * branch;

        left + right
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let left = self.left_bn1.forward(self.left_mid.forward(x.clone()));
        let left = self.relu.forward(self.left_bn2.forward(self.left_pw.forward(left)));

        let right = self.relu.forward(self.right_bn1.forward(self.right_pw1.forward(x)));
        let right = self.right_bn2.forward(self.right_mid.forward(right));
        let right = self.relu.forward(self.right_bn3.forward(self.right_pw2.forward(right)));

        channel_shuffle(Tensor::cat(vec![left, right], 1), 2)
    }
}

/// One downsampling unit followed by its stride-1 units.
#[derive(Module, Debug)]
pub struct ShuffleStage<B: Backend> {
    down: DownsampleUnit<B>,
    units: Vec<ShuffleUnit<B>>,
}

impl<B: Backend> ShuffleStage<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        repeats: usize,
        depthwise: bool,
        device: &B::Device,
    ) -> Self {
        let down = DownsampleUnit::new(in_channels, out_channels, depthwise, device);
        let units = (1..repeats)
            .map(|_| ShuffleUnit::new(out_channels, depthwise, device))
            .collect();

        Self { down, units }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.down.forward(x);
        for unit in &self.units {
            x = unit.forward(x);
        }
        x
    }
}

/// Shuffle image classifier
#[derive(Module, Debug)]
pub struct ShuffleNet<B: Backend> {
    stem: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_pool: MaxPool2d,

    stage2: ShuffleStage<B>,
    stage3: ShuffleStage<B>,
    stage4: ShuffleStage<B>,

    head: Conv2d<B>,
    head_bn: BatchNorm<B, 2>,
    global_pool: AdaptiveAvgPool2d,
    fc: Linear<B>,

    relu: Relu,
    flops: usize,
}

impl<B: Backend> ShuffleNet<B> {
    /// Create a new shuffle classifier from configuration
    pub fn new(config: &ShuffleNetConfig, device: &B::Device) -> Self {
        let depthwise = config.depthwise;
        let stem_width = scaled_channels(STEM_FILTERS, config.width_scale);
        let widths = STAGE_FILTERS.map(|c| scaled_channels(c, config.width_scale));
        let head_width = scaled_channels(HEAD_FILTERS, config.width_scale);

        let stem = Conv2dConfig::new([config.in_channels, stem_width], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let stem_bn = BatchNormConfig::new(stem_width).init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let stage2 = ShuffleStage::new(stem_width, widths[0], STAGE_REPEATS[0], depthwise, device);
        let stage3 = ShuffleStage::new(widths[0], widths[1], STAGE_REPEATS[1], depthwise, device);
        let stage4 = ShuffleStage::new(widths[1], widths[2], STAGE_REPEATS[2], depthwise, device);

        let head = Conv2dConfig::new([widths[2], head_width], [1, 1]).init(device);
        let head_bn = BatchNormConfig::new(head_width).init(device);
        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(head_width, config.num_classes).init(device);

        // Static cost walk mirroring the construction above.
        let (mut h, mut w) = (half(config.height), half(config.width));
        let mut flops = h * w * stem_width * config.in_channels * 9;
        h = half(h);
        w = half(w);

        let mut in_width = stem_width;
        for (out_width, repeats) in widths.into_iter().zip(STAGE_REPEATS) {
            flops += DownsampleUnit::<B>::macs(h, w, in_width, out_width, depthwise);
            h = half(h);
            w = half(w);
            flops += (repeats - 1) * ShuffleUnit::<B>::macs(h, w, out_width, depthwise);
            in_width = out_width;
        }

        flops += h * w * head_width * in_width;
        flops += head_width * config.num_classes;

        Self {
            stem,
            stem_bn,
            stem_pool,
            stage2,
            stage3,
            stage4,
            head,
            head_bn,
            global_pool,
            fc,
            relu: Relu::new(),
            flops,
        }
    }
}

impl<B: Backend> ImageClassifier<B> for ShuffleNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward(images);
        let x = self.relu.forward(self.stem_bn.forward(x));
        let x = self.stem_pool.forward(x);

        let x = self.stage2.forward(x);
        let x = self.stage3.forward(x);
        let x = self.stage4.forward(x);

        let x = self.relu.forward(self.head_bn.forward(self.head.forward(x)));

        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        self.fc.forward(x)
    }

    fn flop_count(&self) -> usize {
        self.flops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type TestBackend = DefaultBackend;

    fn small_config(depthwise: bool) -> ShuffleNetConfig {
        ShuffleNetConfig::new()
            .with_num_classes(7)
            .with_height(64)
            .with_width(64)
            .with_width_scale(0.25)
            .with_depthwise(depthwise)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let model = ShuffleNet::<TestBackend>::new(&small_config(true), &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 7]);
    }

    #[test]
    fn test_schema_is_deterministic() {
        let device = Default::default();
        for depthwise in [true, false] {
            let a = ShuffleNet::<TestBackend>::new(&small_config(depthwise), &device);
            let b = ShuffleNet::<TestBackend>::new(&small_config(depthwise), &device);

            assert_eq!(a.num_params(), b.num_params());
            assert_eq!(a.flop_count(), b.flop_count());
        }
    }

    #[test]
    fn test_depthwise_is_cheaper_than_full_width() {
        let device = Default::default();
        let dw = ShuffleNet::<TestBackend>::new(&small_config(true), &device);
        let vw = ShuffleNet::<TestBackend>::new(&small_config(false), &device);

        assert!(dw.num_params() < vw.num_params());
        assert!(dw.flop_count() < vw.flop_count());
    }

    #[test]
    fn test_channel_shuffle_preserves_shape() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 4, 4], &device);
        let shuffled = channel_shuffle(x, 2);
        assert_eq!(shuffled.dims(), [1, 8, 4, 4]);
    }
}

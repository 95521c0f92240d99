//! Basic CNN variants
//!
//! Two members of the supported-architecture set share this topology: a
//! stack of four strided convolution blocks followed by global pooling and
//! a small classifier head. `basic_dw` builds each block from a depthwise
//! 3x3 plus a pointwise 1x1 convolution; `basic_vw` uses a single
//! full-width 3x3 convolution per block.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::config::{scaled_channels, EvalConfig};
use super::ImageClassifier;

/// Base channel count of the first block before width scaling
const BASE_FILTERS: usize = 32;

/// Hidden width of the classifier head before width scaling
const HEAD_FILTERS: usize = 256;

/// Configuration for the basic CNN variants
#[derive(Config, Debug)]
pub struct BasicNetConfig {
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

    /// Use depthwise-separable convolutions instead of full-width ones
    #[config(default = "true")]
    pub depthwise: bool,

    /// Dropout rate in the classifier head (inactive during evaluation)
    #[config(default = "0.2")]
    pub dropout_rate: f64,
}

impl BasicNetConfig {
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

/// A CNN block: (depthwise +) convolution, BatchNorm, ReLU and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    depthwise: Option<Conv2d<B>>,
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, separable: bool, device: &B::Device) -> Self {
        let (depthwise, conv) = if separable {
            let dw = Conv2dConfig::new([in_channels, in_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .with_groups(in_channels)
                .init(device);
            let pw = Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device);
            (Some(dw), pw)
        } else {
            let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device);
            (None, conv)
        };

        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            depthwise,
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Multiply-accumulates of one forward pass at the given input resolution.
    fn macs(height: usize, width: usize, in_channels: usize, out_channels: usize, separable: bool) -> usize {
        if separable {
            height * width * in_channels * 9 + height * width * in_channels * out_channels
        } else {
            height * width * out_channels * in_channels * 9
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.depthwise {
            Some(dw) => dw.forward(x),
            None => x,
        };
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Basic image classifier
///
/// Architecture:
/// - 4 convolution blocks with doubling channel widths and 2x2 pooling
/// - Global average pooling
/// - Two-layer classifier head with dropout
#[derive(Module, Debug)]
pub struct BasicNet<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    conv3: ConvBlock<B>,
    conv4: ConvBlock<B>,

    global_pool: AdaptiveAvgPool2d,

    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,

    flops: usize,
}

impl<B: Backend> BasicNet<B> {
    /// Create a new basic classifier from configuration
    pub fn new(config: &BasicNetConfig, device: &B::Device) -> Self {
        let base = scaled_channels(BASE_FILTERS, config.width_scale);
        let hidden = scaled_channels(HEAD_FILTERS, config.width_scale);
        let separable = config.depthwise;

        let conv1 = ConvBlock::new(config.in_channels, base, separable, device);
        let conv2 = ConvBlock::new(base, base * 2, separable, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, separable, device);
        let conv4 = ConvBlock::new(base * 4, base * 8, separable, device);

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 8, hidden).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(hidden, config.num_classes).init(device);

        // Static cost walk mirroring the block stack above.
        let (mut h, mut w) = (config.height, config.width);
        let mut flops = 0usize;
        for (cin, cout) in [
            (config.in_channels, base),
            (base, base * 2),
            (base * 2, base * 4),
            (base * 4, base * 8),
        ] {
            flops += ConvBlock::<B>::macs(h, w, cin, cout, separable);
            h /= 2;
            w /= 2;
        }
        flops += base * 8 * hidden + hidden * config.num_classes;

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            fc1,
            dropout,
            fc2,
            flops,
        }
    }
}

impl<B: Backend> ImageClassifier<B> for BasicNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
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

    fn small_config(depthwise: bool) -> BasicNetConfig {
        BasicNetConfig::new()
            .with_num_classes(10)
            .with_height(32)
            .with_width(32)
            .with_depthwise(depthwise)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let model = BasicNet::<TestBackend>::new(&small_config(true), &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 10]);
    }

    #[test]
    fn test_schema_is_deterministic() {
        let device = Default::default();
        for depthwise in [true, false] {
            let a = BasicNet::<TestBackend>::new(&small_config(depthwise), &device);
            let b = BasicNet::<TestBackend>::new(&small_config(depthwise), &device);

            assert_eq!(a.num_params(), b.num_params());
            assert_eq!(a.flop_count(), b.flop_count());
        }
    }

    #[test]
    fn test_depthwise_is_cheaper_than_full_width() {
        let device = Default::default();
        let dw = BasicNet::<TestBackend>::new(&small_config(true), &device);
        let vw = BasicNet::<TestBackend>::new(&small_config(false), &device);

        assert!(dw.num_params() < vw.num_params());
        assert!(dw.flop_count() < vw.flop_count());
    }

    #[test]
    fn test_width_scale_changes_schema() {
        let device = Default::default();
        let narrow = BasicNet::<TestBackend>::new(
            &small_config(true).with_width_scale(0.5),
            &device,
        );
        let wide = BasicNet::<TestBackend>::new(
            &small_config(true).with_width_scale(2.0),
            &device,
        );

        assert!(narrow.num_params() < wide.num_params());
    }
}

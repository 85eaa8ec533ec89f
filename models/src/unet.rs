use burn::{
    config::Config,
    module::Module,
    nn::{
        PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::Backend,
    tensor::Tensor,
};

use crate::{ImageGenerator, ModelError};

#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = 3)]
    pub in_channels: usize,
    /// Channels at the first level, doubled at every level below.
    #[config(default = 16)]
    pub base_channels: usize,
    /// Nr. of pooling levels.
    #[config(default = 4)]
    pub depth: usize,
}

/// Two 3x3 same-padded convolutions, each followed by a ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        let conv = |c_in| {
            Conv2dConfig::new([c_in, channels_out], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Self {
            conv1: conv(channels_in),
            conv2: conv(channels_out),
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.forward(self.conv1.forward(x));
        self.activation.forward(self.conv2.forward(x))
    }
}

/// Encoder/decoder generator with skip connections at every level.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    down: Vec<ConvBlock<B>>,
    pool: MaxPool2d,
    bottleneck: ConvBlock<B>,
    up: Vec<ConvTranspose2d<B>>,
    up_blocks: Vec<ConvBlock<B>>,
    output: Conv2d<B>,
}

impl UNetConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.in_channels == 0 || self.base_channels == 0 {
            return Err(ModelError::InvalidConfig("generator channels must be non-zero".to_owned()));
        }
        Ok(())
    }

    /// Whether square images of `size` survive `depth` rounds of pooling.
    pub fn supports_size(&self, size: usize) -> bool {
        size > 0 && size % (1 << self.depth) == 0
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<UNet<B>, ModelError> {
        self.validate()?;
        let width = |level: usize| self.base_channels << level;

        let down = (0..self.depth)
            .map(|level| {
                let c_in = if level == 0 { self.in_channels } else { width(level - 1) };
                ConvBlock::new(c_in, width(level), device)
            })
            .collect();

        let bottleneck_in = if self.depth == 0 {
            self.in_channels
        } else {
            width(self.depth - 1)
        };
        let bottleneck = ConvBlock::new(bottleneck_in, width(self.depth), device);

        // Decoder levels run from the deepest up.
        let up = (0..self.depth)
            .rev()
            .map(|level| {
                ConvTranspose2dConfig::new([width(level + 1), width(level)], [2, 2])
                    .with_stride([2, 2])
                    .init(device)
            })
            .collect();
        let up_blocks = (0..self.depth)
            .rev()
            .map(|level| ConvBlock::new(2 * width(level), width(level), device))
            .collect();

        let output = Conv2dConfig::new([width(0), self.in_channels], [1, 1]).init(device);

        Ok(UNet {
            down,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottleneck,
            up,
            up_blocks,
            output,
        })
    }
}

impl<B: Backend> ImageGenerator<B> for UNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.down.len());
        let mut x = images;
        for block in &self.down {
            let features = block.forward(x);
            x = self.pool.forward(features.clone());
            skips.push(features);
        }

        x = self.bottleneck.forward(x);

        for ((up, block), skip) in self.up.iter().zip(&self.up_blocks).zip(skips.into_iter().rev()) {
            let upsampled = up.forward(x);
            x = block.forward(Tensor::cat(vec![skip, upsampled], 1));
        }
        self.output.forward(x)
    }
}

use burn::{
    config::Config,
    module::Module,
    nn::{
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    },
    prelude::Backend,
    tensor::Tensor,
};

use crate::{ImageClassifier, ModelError};

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 16)]
    pub base_channels: usize,
    /// Nr. of residual stages, every stage after the first halves the resolution.
    #[config(default = 3)]
    pub stages: usize,
    #[config(default = 2)]
    pub num_classes: usize,
}

#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(channels_in: usize, channels_out: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([channels_in, channels_out], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            norm: BatchNormConfig::new(channels_out).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

/// Basic residual block: two conv/batch-norm pairs around an identity skip.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    first: ConvBn<B>,
    second: ConvBn<B>,
    activation: Relu,
}

impl<B: Backend> ResidualBlock<B> {
    fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            first: ConvBn::new(channels, channels, 1, device),
            second: ConvBn::new(channels, channels, 1, device),
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.activation.forward(self.first.forward(x.clone()));
        self.activation.forward(self.second.forward(y) + x)
    }
}

#[derive(Module, Debug)]
pub struct ResidualClassifier<B: Backend> {
    stem: ConvBn<B>,
    /// Strided transitions between stages, one fewer than `blocks`.
    transitions: Vec<ConvBn<B>>,
    blocks: Vec<ResidualBlock<B>>,
    activation: Relu,
    pool: AdaptiveAvgPool2d,
    head: Linear<B>,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.in_channels == 0 || self.base_channels == 0 || self.stages == 0 {
            return Err(ModelError::InvalidConfig(
                "classifier channels and stages must be non-zero".to_owned(),
            ));
        }
        if self.num_classes < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "classifier needs at least 2 classes, got {}",
                self.num_classes
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResidualClassifier<B>, ModelError> {
        self.validate()?;
        let width = |stage: usize| self.base_channels << stage;

        Ok(ResidualClassifier {
            stem: ConvBn::new(self.in_channels, width(0), 1, device),
            transitions: (1..self.stages)
                .map(|stage| ConvBn::new(width(stage - 1), width(stage), 2, device))
                .collect(),
            blocks: (0..self.stages).map(|stage| ResidualBlock::new(width(stage), device)).collect(),
            activation: Relu::new(),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head: LinearConfig::new(width(self.stages - 1), self.num_classes).init(device),
        })
    }
}

impl<B: Backend> ImageClassifier<B> for ResidualClassifier<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.activation.forward(self.stem.forward(images));
        for (stage, block) in self.blocks.iter().enumerate() {
            if stage > 0 {
                x = self.activation.forward(self.transitions[stage - 1].forward(x));
            }
            x = block.forward(x);
        }
        let [n, c, _, _] = x.dims();
        self.head.forward(self.pool.forward(x).reshape([n, c]))
    }
}

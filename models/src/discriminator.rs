use burn::{
    config::Config,
    module::{Module, Param},
    prelude::Backend,
    tensor::{
        Distribution, Tensor,
        activation::leaky_relu,
        module::{conv2d, conv_transpose2d},
        ops::{ConvOptions, ConvTransposeOptions},
    },
};

use crate::{Critic, ModelError};

const KERNEL: usize = 4;

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    #[config(default = 3)]
    pub in_channels: usize,
    /// Channels of the first strided layer, doubled per layer.
    #[config(default = 32)]
    pub base_channels: usize,
    #[config(default = 256)]
    pub max_channels: usize,
    /// Nr. of stride-2 convolutions before the linear head.
    #[config(default = 4)]
    pub downsampling: usize,
    /// Square input size, must be divisible by 2^downsampling.
    #[config(default = 128)]
    pub image_size: usize,
    /// Negative slope of the leaky ReLU activations.
    #[config(default = 0.2)]
    pub slope: f64,
}

/// Strided 4x4 convolution, halving the spatial size.
#[derive(Module, Debug)]
pub struct CriticConv<B: Backend> {
    pub weight: Param<Tensor<B, 4>>,
    pub bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> CriticConv<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        let bound = 1.0 / ((channels_in * KERNEL * KERNEL) as f64).sqrt();
        let dist = Distribution::Uniform(-bound, bound);
        Self {
            weight: Param::from_tensor(Tensor::random([channels_out, channels_in, KERNEL, KERNEL], dist, device)),
            bias: Param::from_tensor(Tensor::random([channels_out], dist, device)),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(x, self.weight.val(), Some(self.bias.val()), ConvOptions::new([2, 2], [1, 1], [1, 1], 1))
    }

    /// Vector-Jacobian product of [`Self::forward`] with respect to its input.
    fn adjoint(&self, grad: Tensor<B, 4>) -> Tensor<B, 4> {
        conv_transpose2d(
            grad,
            self.weight.val(),
            None,
            ConvTransposeOptions::new([2, 2], [1, 1], [0, 0], [1, 1], 1),
        )
    }
}

/// Convolutional leaky-ReLU critic with a linear scoring head.
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub blocks: Vec<CriticConv<B>>,
    /// `[features, 1]`
    pub head_weight: Param<Tensor<B, 2>>,
    pub head_bias: Param<Tensor<B, 1>>,
    pub slope: f64,
}

impl DiscriminatorConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.in_channels == 0 || self.base_channels == 0 || self.image_size == 0 {
            return Err(ModelError::InvalidConfig(
                "discriminator channels and image size must be non-zero".to_owned(),
            ));
        }
        let factor = 1usize << self.downsampling;
        if self.image_size % factor != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "image size {} is not divisible by 2^{} for the discriminator",
                self.image_size, self.downsampling
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Discriminator<B>, ModelError> {
        self.validate()?;

        let mut blocks = Vec::with_capacity(self.downsampling);
        let mut channels = self.in_channels;
        for i in 0..self.downsampling {
            let out = (self.base_channels << i).min(self.max_channels);
            blocks.push(CriticConv::new(channels, out, device));
            channels = out;
        }

        let side = self.image_size >> self.downsampling;
        let features = channels * side * side;
        let bound = 1.0 / (features as f64).sqrt();
        let dist = Distribution::Uniform(-bound, bound);

        Ok(Discriminator {
            blocks,
            head_weight: Param::from_tensor(Tensor::random([features, 1], dist, device)),
            head_bias: Param::from_tensor(Tensor::random([1], dist, device)),
            slope: self.slope,
        })
    }
}

fn leaky_relu_derivative<B: Backend>(pre_activation: Tensor<B, 4>, slope: f64) -> Tensor<B, 4> {
    pre_activation
        .greater_elem(0.0)
        .float()
        .mul_scalar(1.0 - slope)
        .add_scalar(slope)
}

impl<B: Backend> Discriminator<B> {
    /// Runs the convolutional trunk, returning the final activation and
    /// every pre-activation.
    fn trunk(&self, images: Tensor<B, 4>) -> (Tensor<B, 4>, Vec<Tensor<B, 4>>) {
        let mut pre_activations = Vec::with_capacity(self.blocks.len());
        let mut x = images;
        for block in &self.blocks {
            let z = block.forward(x);
            x = leaky_relu(z.clone(), self.slope);
            pre_activations.push(z);
        }
        (x, pre_activations)
    }
}

impl<B: Backend> Critic<B> for Discriminator<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let (x, _) = self.trunk(images);
        let [n, c, h, w] = x.dims();
        x.reshape([n, c * h * w]).matmul(self.head_weight.val()) + self.head_bias.val().unsqueeze()
    }

    fn input_gradient(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let (x, pre_activations) = self.trunk(images);
        let [n, c, h, w] = x.dims();

        let ones = Tensor::<B, 2>::ones([n, 1], &x.device());
        let mut grad = ones
            .matmul(self.head_weight.val().transpose())
            .reshape([n, c, h, w]);

        for (block, z) in self.blocks.iter().zip(pre_activations).rev() {
            grad = block.adjoint(grad * leaky_relu_derivative(z, self.slope));
        }
        grad
    }
}

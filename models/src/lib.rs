#![recursion_limit = "256"]

use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use thiserror::Error;

pub mod classifier;
pub mod discriminator;
pub mod unet;

pub use classifier::{ClassifierConfig, ResidualClassifier};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use unet::{UNet, UNetConfig};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid network config: {0}")]
    InvalidConfig(String),
}

/// An image-to-image network, `[N, C, H, W] -> [N, C, H, W]`.
pub trait ImageGenerator<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// An image classifier producing unnormalised logits `[N, classes]`.
pub trait ImageClassifier<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// A Wasserstein critic scoring images, `[N, C, H, W] -> [N, 1]`.
pub trait Critic<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Gradient of `sum(forward(images))` with respect to `images`.
    ///
    /// The result must be built from differentiable tensor operations on the
    /// critic's parameters, so that a loss depending on it (the gradient
    /// penalty) can itself be back-propagated into those parameters.
    fn input_gradient(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

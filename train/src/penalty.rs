use burn::{
    prelude::{Backend, Tensor},
    tensor::{Distribution, ElementConversion, backend::AutodiffBackend},
};
use models::Critic;

use crate::error::{Result, TrainError};

/// `theta * real + (1 - theta) * fake` on detached values, one `theta` per sample.
pub fn interpolate<B: Backend>(real: Tensor<B, 4>, fake: Tensor<B, 4>, theta: Tensor<B, 1>) -> Result<Tensor<B, 4>> {
    let [n, _, _, _] = real.dims();
    if fake.dims() != real.dims() {
        return Err(TrainError::CriticGradient(format!(
            "real {:?} and fake {:?} samples differ in shape",
            real.dims(),
            fake.dims()
        )));
    }
    if theta.dims() != [n] {
        return Err(TrainError::CriticGradient(format!(
            "{:?} interpolation coefficients for {n} samples",
            theta.dims()
        )));
    }

    let theta: Tensor<B, 4> = theta.reshape([n, 1, 1, 1]);
    let one_minus = theta.clone().neg().add_scalar(1.0);
    Ok(real.detach() * theta + fake.detach() * one_minus)
}

/// WGAN-GP penalty, `eta * mean((|grad D(x_hat)| - 1)^2)` for uniformly drawn
/// interpolation coefficients.
pub fn gradient_penalty<B: AutodiffBackend, D: Critic<B>>(
    critic: &D,
    real: Tensor<B, 4>,
    fake: Tensor<B, 4>,
    eta: f32,
) -> Result<Tensor<B, 1>> {
    let [n, _, _, _] = real.dims();
    let theta = Tensor::random([n], Distribution::Uniform(0.0, 1.0), &real.device());
    gradient_penalty_at(critic, real, fake, theta, eta)
}

/// [`gradient_penalty`] with explicit interpolation coefficients.
///
/// The input gradient stays attached to the critic's parameters, so the
/// returned penalty can be back-propagated into them.
pub fn gradient_penalty_at<B: AutodiffBackend, D: Critic<B>>(
    critic: &D,
    real: Tensor<B, 4>,
    fake: Tensor<B, 4>,
    theta: Tensor<B, 1>,
    eta: f32,
) -> Result<Tensor<B, 1>> {
    let x_hat = interpolate(real, fake, theta)?;
    let dims = x_hat.dims();

    let grad = critic.input_gradient(x_hat);
    if grad.dims() != dims {
        return Err(TrainError::CriticGradient(format!(
            "input gradient {:?} does not match input {dims:?}",
            grad.dims()
        )));
    }

    let [n, c, h, w] = dims;
    let norm = grad
        .reshape([n, c * h * w])
        .powi_scalar(2)
        .sum_dim(1)
        .add_scalar(1e-12)
        .sqrt();

    Ok(norm.sub_scalar(1.0).powi_scalar(2).mean() * eta)
}

/// Compares the critic's input gradient against first-order autodiff on
/// `sample`. Fails when they disagree by more than `tolerance` times the
/// largest autodiff gradient entry, or when that gradient is all zero.
pub fn check_critic_gradient<B: AutodiffBackend, D: Critic<B>>(
    critic: &D,
    sample: Tensor<B, 4>,
    tolerance: f32,
) -> Result<()> {
    let analytic = critic.input_gradient(sample.clone()).inner();

    let sample = sample.detach().require_grad();
    let grads = critic.forward(sample.clone()).sum().backward();
    let reference = sample
        .grad(&grads)
        .ok_or_else(|| TrainError::CriticGradient("critic output does not depend on its input".to_owned()))?;

    if analytic.dims() != reference.dims() {
        return Err(TrainError::CriticGradient(format!(
            "input gradient {:?} does not match input {:?}",
            analytic.dims(),
            reference.dims()
        )));
    }

    let scale: f32 = reference.clone().abs().max().into_scalar().elem();
    if !scale.is_finite() || scale == 0.0 {
        return Err(TrainError::CriticGradient(format!(
            "autodiff input gradient is degenerate (max |grad| = {scale:e})"
        )));
    }
    let error: f32 = (analytic - reference).abs().max().into_scalar().elem();
    if !error.is_finite() || error > (tolerance * scale).max(f32::EPSILON) {
        return Err(TrainError::CriticGradient(format!(
            "input gradient deviates from autodiff by {error:e}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::{Module, Param};
    use burn::tensor::TensorData;
    use models::DiscriminatorConfig;

    type Backend = Autodiff<NdArray>;

    /// `D(x) = sum(x * w)` with a fixed per-pixel weight, so `grad D = w`.
    #[derive(Module, Debug)]
    struct LinearCritic<B: burn::prelude::Backend> {
        weight: Param<Tensor<B, 4>>,
    }

    impl<B: burn::prelude::Backend> Critic<B> for LinearCritic<B> {
        fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
            let [n, c, h, w] = images.dims();
            (images * self.weight.val()).reshape([n, c * h * w]).sum_dim(1)
        }

        fn input_gradient(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
            let [n, _, _, _] = images.dims();
            self.weight.val().repeat_dim(0, n)
        }
    }

    fn linear_critic(value: f32, device: &<Backend as burn::prelude::Backend>::Device) -> LinearCritic<Backend> {
        LinearCritic {
            weight: Param::from_tensor(Tensor::full([1, 1, 2, 2], value, device)),
        }
    }

    fn scalar(t: Tensor<Backend, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn interpolation_respects_theta() {
        let device = Default::default();
        let real = Tensor::<Backend, 4>::ones([2, 1, 2, 2], &device);
        let fake = Tensor::<Backend, 4>::zeros([2, 1, 2, 2], &device);
        let theta = Tensor::from_data(TensorData::new(vec![0.25f32, 1.0], [2]), &device);
        let mixed = interpolate(real, fake, theta).unwrap().into_data().into_vec::<f32>().unwrap();
        assert_eq!(mixed, vec![0.25, 0.25, 0.25, 0.25, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn penalty_matches_analytic_value_for_linear_critic() {
        let device = Default::default();
        // |grad| = sqrt(4 * 0.25) = 1 per sample, so the penalty vanishes.
        let unit = linear_critic(0.5, &device);
        let real = Tensor::<Backend, 4>::random([3, 1, 2, 2], Distribution::Default, &device);
        let fake = Tensor::<Backend, 4>::random([3, 1, 2, 2], Distribution::Default, &device);
        let gp = scalar(gradient_penalty(&unit, real.clone(), fake.clone(), 10.0).unwrap());
        assert!(gp.abs() < 1e-5, "{gp}");

        // |grad| = 2, penalty = eta * (2 - 1)^2.
        let steep = linear_critic(1.0, &device);
        let gp = scalar(gradient_penalty(&steep, real, fake, 10.0).unwrap());
        assert!((gp - 10.0).abs() < 1e-4, "{gp}");
    }

    #[test]
    fn penalty_is_non_negative_and_reaches_critic_parameters() {
        let device = Default::default();
        let critic = DiscriminatorConfig::new()
            .with_in_channels(3)
            .with_base_channels(2)
            .with_downsampling(2)
            .with_image_size(4)
            .init::<Backend>(&device)
            .unwrap();
        let real = Tensor::<Backend, 4>::random([2, 3, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let fake = Tensor::<Backend, 4>::random([2, 3, 4, 4], Distribution::Normal(0.0, 1.0), &device);

        for theta in [0.0f32, 0.3, 1.0] {
            let theta = Tensor::full([2], theta, &device);
            let gp = gradient_penalty_at(&critic, real.clone(), fake.clone(), theta, 10.0).unwrap();
            let grads = gp.clone().backward();
            assert!(scalar(gp) >= 0.0);
            assert!(critic.head_weight.val().grad(&grads).is_some());
            assert!(critic.blocks[0].weight.val().grad(&grads).is_some());
        }
    }

    #[test]
    fn linear_penalty_gradient_is_analytic() {
        let device = Default::default();
        // For D = sum(x * w) with w = 1 on 4 pixels, |grad| = 2 and
        // d/dw_i of eta * (|w| - 1)^2 is eta * 2 * (|w| - 1) * w_i / |w| = 10.
        let critic = linear_critic(1.0, &device);
        let real = Tensor::<Backend, 4>::ones([2, 1, 2, 2], &device);
        let fake = Tensor::<Backend, 4>::zeros([2, 1, 2, 2], &device);
        let gp = gradient_penalty(&critic, real, fake, 10.0).unwrap();
        let grads = gp.backward();
        let grad = critic.weight.val().grad(&grads).unwrap().into_data().into_vec::<f32>().unwrap();
        for g in grad {
            assert!((g - 10.0).abs() < 1e-3, "{g}");
        }
    }

    #[test]
    fn mismatched_samples_are_rejected() {
        let device = Default::default();
        let critic = linear_critic(1.0, &device);
        let real = Tensor::<Backend, 4>::ones([2, 1, 2, 2], &device);
        let fake = Tensor::<Backend, 4>::zeros([3, 1, 2, 2], &device);
        let err = gradient_penalty(&critic, real, fake, 10.0).unwrap_err();
        assert!(matches!(err, TrainError::CriticGradient(_)));
    }

    #[test]
    fn reference_critic_passes_the_gradient_check() {
        let device = Default::default();
        let critic = DiscriminatorConfig::new()
            .with_base_channels(2)
            .with_downsampling(2)
            .with_image_size(8)
            .init::<Backend>(&device)
            .unwrap();
        let sample = Tensor::<Backend, 4>::random([2, 3, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        check_critic_gradient(&critic, sample, 1e-3).unwrap();
    }

    #[test]
    fn zero_input_gradient_fails_the_gradient_check() {
        #[derive(Module, Debug)]
        struct ZeroGradient<B: burn::prelude::Backend> {
            inner: models::Discriminator<B>,
        }

        impl<B: burn::prelude::Backend> Critic<B> for ZeroGradient<B> {
            fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
                self.inner.forward(images)
            }

            fn input_gradient(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
                images.zeros_like()
            }
        }

        let device = Default::default();
        // Default widths keep every true gradient entry well below 1.
        let critic = ZeroGradient {
            inner: DiscriminatorConfig::new().with_image_size(32).init::<Backend>(&device).unwrap(),
        };
        let sample = Tensor::<Backend, 4>::random([1, 3, 32, 32], Distribution::Normal(0.0, 1.0), &device);
        let err = check_critic_gradient(&critic, sample, 1e-3).unwrap_err();
        assert!(matches!(err, TrainError::CriticGradient(_)));
    }

    #[test]
    fn inconsistent_critic_fails_the_gradient_check() {
        #[derive(Module, Debug)]
        struct Broken<B: burn::prelude::Backend> {
            inner: LinearCritic<B>,
        }

        impl<B: burn::prelude::Backend> Critic<B> for Broken<B> {
            fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
                self.inner.forward(images)
            }

            fn input_gradient(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
                self.inner.input_gradient(images) * 2.0
            }
        }

        let device = Default::default();
        let critic = Broken { inner: linear_critic(1.0, &device) };
        let sample = Tensor::<Backend, 4>::ones([1, 1, 2, 2], &device);
        let err = check_critic_gradient(&critic, sample, 1e-3).unwrap_err();
        assert!(matches!(err, TrainError::CriticGradient(_)));
    }
}

use burn::{
    lr_scheduler::{
        LrScheduler,
        exponential::{ExponentialLrScheduler, ExponentialLrSchedulerConfig},
    },
    module::AutodiffModule,
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::backend::AutodiffBackend,
};

use crate::config::TrainConfig;
use crate::error::{Result, TrainError};

const ADAM_EPSILON: f32 = 1e-8;

/// Adam paired with a per-epoch exponential learning rate schedule.
pub struct ScheduledAdam<B: AutodiffBackend, M: AutodiffModule<B>> {
    optim: OptimizerAdaptor<Adam, M, B>,
    scheduler: ExponentialLrScheduler,
    lr: f64,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> ScheduledAdam<B, M> {
    fn new(config: AdamConfig, initial_lr: f64, decay: f64) -> Result<Self> {
        let mut scheduler = ExponentialLrSchedulerConfig::new(initial_lr, decay)
            .init()
            .map_err(TrainError::Schedule)?;
        // The schedule starts one decay before its initial rate, the first
        // step lands on it.
        let lr = scheduler.step();
        Ok(Self {
            optim: config.init(),
            scheduler,
            lr,
        })
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    fn advance(&mut self) -> f64 {
        self.lr = self.scheduler.step();
        self.lr
    }

    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        self.optim.step(self.lr, module, grads)
    }
}

/// Independent optimizers for the generator, critic and classifier.
pub struct OptimizerSet<B: AutodiffBackend, G: AutodiffModule<B>, D: AutodiffModule<B>, C: AutodiffModule<B>> {
    pub generator: ScheduledAdam<B, G>,
    pub critic: ScheduledAdam<B, D>,
    pub classifier: ScheduledAdam<B, C>,
}

impl<B, G, D, C> OptimizerSet<B, G, D, C>
where
    B: AutodiffBackend,
    G: AutodiffModule<B>,
    D: AutodiffModule<B>,
    C: AutodiffModule<B>,
{
    pub fn new(config: &TrainConfig) -> Result<Self> {
        let adversarial = AdamConfig::new()
            .with_beta_1(config.beta1)
            .with_beta_2(0.9)
            .with_epsilon(ADAM_EPSILON);
        let classifier = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(ADAM_EPSILON);

        Ok(Self {
            generator: ScheduledAdam::new(adversarial.clone(), config.lr, config.lr_decay)?,
            critic: ScheduledAdam::new(adversarial, config.lr, config.lr_decay)?,
            classifier: ScheduledAdam::new(classifier, config.lr, config.lr_decay)?,
        })
    }

    /// Decays every learning rate once. Called at the start of each epoch.
    pub fn advance_epoch(&mut self) {
        let lr = self.critic.advance();
        self.generator.advance();
        self.classifier.advance();
        log::debug!("Learning rate now {lr:e}");
    }

    /// The critic's current learning rate, reported in the run log.
    pub fn lr(&self) -> f64 {
        self.critic.lr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::{Module, Param};
    use burn::prelude::Tensor;

    type Backend = Autodiff<NdArray>;

    #[derive(Module, Debug)]
    struct Scalar<B: burn::prelude::Backend> {
        value: Param<Tensor<B, 1>>,
    }

    fn scalar(value: f32) -> Scalar<Backend> {
        Scalar {
            value: Param::from_tensor(Tensor::from_floats([value], &Default::default())),
        }
    }

    fn value(module: &Scalar<Backend>) -> f32 {
        module.value.val().into_scalar()
    }

    #[test]
    fn learning_rates_decay_per_epoch() {
        let config = TrainConfig::new().with_lr(2e-4).with_lr_decay(0.9);
        let mut optims = OptimizerSet::<Backend, Scalar<Backend>, Scalar<Backend>, Scalar<Backend>>::new(&config).unwrap();

        for k in 0..5 {
            let expected = 2e-4 * 0.9f64.powi(k);
            for lr in [optims.generator.lr(), optims.critic.lr(), optims.classifier.lr()] {
                assert!((lr - expected).abs() < 1e-12 * expected.max(1.0), "{lr} != {expected}");
            }
            optims.advance_epoch();
        }
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let config = TrainConfig::new().with_lr_decay(1.5);
        let err = OptimizerSet::<Backend, Scalar<Backend>, Scalar<Backend>, Scalar<Backend>>::new(&config).err();
        assert!(matches!(err, Some(TrainError::Schedule(_))));
    }

    #[test]
    fn stepping_one_optimizer_leaves_the_others_alone() {
        let config = TrainConfig::new().with_lr(0.1);
        let mut optims = OptimizerSet::<Backend, Scalar<Backend>, Scalar<Backend>, Scalar<Backend>>::new(&config).unwrap();

        let generator = scalar(1.0);
        let critic = scalar(1.0);

        let loss = generator.value.val() * 3.0 + critic.value.val() * 5.0;
        let mut grads = loss.backward();
        let generator_grads = GradientsParams::from_module(&mut grads, &generator);

        let generator = optims.generator.step(generator, generator_grads);
        assert!(value(&generator) < 1.0);
        assert_eq!(value(&critic), 1.0);

        // The critic's Adam state is still fresh: its first step moves by the full lr.
        let loss = critic.value.val() * 5.0;
        let mut grads = loss.backward();
        let critic_grads = GradientsParams::from_module(&mut grads, &critic);
        let critic = optims.critic.step(critic, critic_grads);
        assert!((value(&critic) - 0.9).abs() < 1e-4);
    }
}

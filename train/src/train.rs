use crate::{
    config::TrainConfig,
    error::Result,
    loss::{
        classification_loss, critic_fake_loss, critic_real_loss, total_variation_loss, weighted_reconstruction_loss,
    },
    msg::{AdversarialSnapshot, LossSnapshot, StepStats},
    optim::OptimizerSet,
    penalty::gradient_penalty,
    stats::RunLog,
};

use burn::{
    module::AutodiffModule,
    optim::GradientsParams,
    prelude::{Backend, Int, Tensor, TensorData},
    tensor::{ElementConversion, backend::AutodiffBackend},
};
use dataset::PairedBatch;
use models::{Critic, ImageClassifier, ImageGenerator};
use rand::{SeedableRng, prelude::SliceRandom, rngs::StdRng};
use tracing::trace_span;

/// The three jointly trained networks, moved through every step.
#[derive(Clone, Debug)]
pub struct Networks<G, D, C> {
    pub generator: G,
    pub critic: D,
    pub classifier: C,
}

/// Where a step sits in the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepContext {
    /// 1-based epoch.
    pub epoch: usize,
    pub total_epochs: usize,
    /// 1-based batch index within the epoch.
    pub batch_idx: usize,
    /// Monotonic step counter across the whole run.
    pub global_step: usize,
}

impl StepContext {
    pub fn new(epoch: usize, total_epochs: usize, batch_idx: usize, batches_per_epoch: usize) -> Self {
        Self {
            epoch,
            total_epochs,
            batch_idx,
            global_step: (epoch - 1) * batches_per_epoch + batch_idx,
        }
    }
}

/// Lesion and normal halves of a batch stacked into one, `[2N, ...]`.
#[derive(Clone, Debug)]
pub struct UnionBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub labels: Tensor<B, 1, Int>,
    pub weights: Tensor<B, 4>,
}

impl<B: Backend> UnionBatch<B> {
    pub fn from_paired(batch: &PairedBatch<B>) -> Self {
        Self {
            images: Tensor::cat(vec![batch.lesion.clone(), batch.normal.clone()], 0),
            labels: Tensor::cat(vec![batch.lesion_labels.clone(), batch.normal_labels.clone()], 0),
            weights: Tensor::cat(vec![batch.lesion_weights.clone(), batch.normal_weights.clone()], 0),
        }
    }

    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reorders images, labels and weights with the same permutation.
pub fn apply_permutation<B: Backend>(union: UnionBatch<B>, permutation: &[usize]) -> UnionBatch<B> {
    let device = union.images.device();
    let indices: Vec<i64> = permutation.iter().map(|&i| i as i64).collect();
    let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(indices, [permutation.len()]), &device);

    UnionBatch {
        images: union.images.select(0, indices.clone()),
        labels: union.labels.select(0, indices.clone()),
        weights: union.weights.select(0, indices),
    }
}

/// Stacks both halves of `batch` and shuffles them with one random permutation.
pub fn shuffle_union<B: Backend>(batch: &PairedBatch<B>, rng: &mut StdRng) -> UnionBatch<B> {
    let union = UnionBatch::from_paired(batch);
    let mut permutation: Vec<usize> = (0..union.len()).collect();
    permutation.shuffle(rng);
    apply_permutation(union, &permutation)
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.into_scalar().elem()
}

/// Runs the three-stage WGAN-GP update of the generator, critic and classifier.
pub struct UdcTrainer<B, G, D, C>
where
    B: AutodiffBackend,
    G: AutodiffModule<B>,
    D: AutodiffModule<B>,
    C: AutodiffModule<B>,
{
    config: TrainConfig,
    optims: OptimizerSet<B, G, D, C>,
    rng: StdRng,
    log: RunLog,
}

impl<B, G, D, C> UdcTrainer<B, G, D, C>
where
    B: AutodiffBackend,
    G: ImageGenerator<B> + AutodiffModule<B>,
    D: Critic<B> + AutodiffModule<B>,
    C: ImageClassifier<B> + AutodiffModule<B>,
{
    pub fn new(config: &TrainConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            optims: OptimizerSet::new(config)?,
            rng: StdRng::seed_from_u64(config.seed),
            log: RunLog::new(config.interval),
        })
    }

    /// Decays all learning rates. Call once at the start of every epoch.
    pub fn advance_epoch(&mut self) {
        self.optims.advance_epoch();
    }

    pub fn lr(&self) -> f64 {
        self.optims.lr()
    }

    pub fn run_log(&self) -> &RunLog {
        &self.log
    }

    pub fn step(
        &mut self,
        nets: Networks<G, D, C>,
        batch: &PairedBatch<B>,
        ctx: StepContext,
    ) -> Result<(Networks<G, D, C>, StepStats)> {
        // Nothing is updated for a malformed batch.
        batch.validate()?;

        let Networks {
            mut generator,
            mut critic,
            mut classifier,
        } = nets;
        let config = &self.config;

        let (reconstruction, classification) = {
            let _span = trace_span!("Generator and classifier step").entered();

            let union = shuffle_union(batch, &mut self.rng);
            let code = generator.forward(union.images.clone());
            let logits = classifier.forward(code.clone() - union.images.clone());
            let c_loss = classification_loss(logits, union.labels)?;
            let u_loss = weighted_reconstruction_loss(code, union.images, union.weights)?;

            let reconstruction = u_loss * config.lmbda;
            let classification = c_loss * config.sigma;
            let loss = reconstruction.clone() + classification.clone();

            let mut grads = trace_span!("Backward pass").in_scope(|| loss.backward());
            let grads_generator = GradientsParams::from_module(&mut grads, &generator);
            let grads_classifier = GradientsParams::from_module(&mut grads, &classifier);
            generator = self.optims.generator.step(generator, grads_generator);
            classifier = self.optims.classifier.step(classifier, grads_classifier);

            (scalar(reconstruction), scalar(classification))
        };

        let (fake, d_loss, d_real_loss, d_fake_loss, penalty) = {
            let _span = trace_span!("Critic step").entered();

            let fake = generator.forward(batch.lesion.clone());
            let d_real = critic_real_loss(critic.forward(batch.normal.clone()));
            let d_fake = critic_fake_loss(critic.forward(fake.clone().detach()));
            let penalty = gradient_penalty(&critic, batch.normal.clone(), fake.clone(), config.gp_weight)?;
            let d_loss = d_real.clone() + d_fake.clone() + penalty.clone();

            let mut grads = trace_span!("Backward pass").in_scope(|| d_loss.backward());
            let grads_critic = GradientsParams::from_module(&mut grads, &critic);
            critic = self.optims.critic.step(critic, grads_critic);

            (fake, scalar(d_loss), scalar(d_real), scalar(d_fake), scalar(penalty))
        };

        let adversarial = if ctx.global_step > config.pretrained_steps {
            let _span = trace_span!("Generator adversarial step").entered();

            let adversarial = critic.forward(fake.clone()).mean().neg() * config.alpha;
            let normal_rec = generator.forward(batch.normal.clone());
            let normal_l1 =
                weighted_reconstruction_loss(normal_rec, batch.normal.clone(), batch.normal_weights.clone())?
                    * config.gamma;
            let lesion_l1 =
                weighted_reconstruction_loss(fake.clone(), batch.lesion.clone(), batch.lesion_weights.clone())?
                    * config.gamma;
            let tv = total_variation_loss(fake - batch.lesion.clone()) * config.theta;
            let total = adversarial.clone() + normal_l1.clone() + lesion_l1.clone() + tv.clone();

            // Only the generator steps, the critic's gradients are dropped.
            let mut grads = trace_span!("Backward pass").in_scope(|| total.backward());
            let grads_generator = GradientsParams::from_module(&mut grads, &generator);
            generator = self.optims.generator.step(generator, grads_generator);

            Some(AdversarialSnapshot {
                adversarial: scalar(adversarial),
                normal_l1: scalar(normal_l1),
                lesion_l1: scalar(lesion_l1),
                tv: scalar(tv),
                total: scalar(total),
            })
        } else {
            None
        };

        let snapshot = LossSnapshot {
            epoch: ctx.epoch,
            total_epochs: ctx.total_epochs,
            batch_idx: ctx.batch_idx,
            global_step: ctx.global_step,
            generator_loss: reconstruction + classification,
            reconstruction,
            classification,
            d_loss,
            d_real_loss,
            d_fake_loss,
            gradient_penalty: penalty,
            w_distance: d_real_loss + d_fake_loss,
            adversarial,
            lr: self.optims.lr(),
        };
        let logged = self.log.record(&snapshot);
        if logged {
            log::info!("{snapshot}");
        }

        Ok((
            Networks {
                generator,
                critic,
                classifier,
            },
            StepStats { snapshot, logged },
        ))
    }
}

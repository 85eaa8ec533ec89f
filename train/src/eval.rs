use burn::prelude::{Backend, Tensor};
use burn::tensor::ElementConversion;
use dataset::PairedBatch;
use models::{Critic, ImageGenerator};

use crate::ssim::Ssim;

const SSIM_WINDOW_SIZE: usize = 11;

pub struct EvalSample<B: Backend> {
    pub lesion: Tensor<B, 4>,
    pub lesion_output: Tensor<B, 4>,
    pub lesion_names: Vec<String>,
    pub normal: Tensor<B, 4>,
    pub normal_output: Tensor<B, 4>,
    pub normal_names: Vec<String>,
    /// Critic scores of the normal images.
    pub real_scores: Vec<f32>,
    /// Critic scores of the generated lesion reconstructions.
    pub fake_scores: Vec<f32>,
    /// Mean SSIM between normal images and their reconstructions.
    pub ssim: f32,
}

fn to_unit_range<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    (images * 0.5 + 0.5).clamp(0.0, 1.0)
}

fn scores<B: Backend>(scores: Tensor<B, 2>) -> Vec<f32> {
    scores.into_data().iter::<f32>().collect()
}

/// Runs the generator and critic over one validation batch.
pub fn eval_batch<B: Backend, G: ImageGenerator<B>, D: Critic<B>>(
    generator: &G,
    critic: &D,
    batch: &PairedBatch<B>,
) -> EvalSample<B> {
    let lesion_output = generator.forward(batch.lesion.clone());
    let normal_output = generator.forward(batch.normal.clone());

    let fake_scores = scores(critic.forward(lesion_output.clone()));
    let real_scores = scores(critic.forward(batch.normal.clone()));

    let [_, channels, _, _] = batch.normal.dims();
    let ssim_measure = Ssim::new(SSIM_WINDOW_SIZE, channels, &batch.normal.device());
    let ssim = ssim_measure
        .ssim(to_unit_range(normal_output.clone()), to_unit_range(batch.normal.clone()))
        .mean()
        .into_scalar()
        .elem();

    EvalSample {
        lesion: batch.lesion.clone(),
        lesion_output,
        lesion_names: batch.lesion_names.clone(),
        normal: batch.normal.clone(),
        normal_output,
        normal_names: batch.normal_names.clone(),
        real_scores,
        fake_scores,
        ssim,
    }
}

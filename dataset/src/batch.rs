use burn::prelude::{Backend, Int, Tensor, TensorData};

use crate::error::{DatasetError, Result};
use crate::sample::Sample;

/// Aligned lesion and normal mini-batches.
///
/// Images are `[N, C, H, W]`, weight maps `[N, 1, H, W]` and labels `[N]`.
#[derive(Clone, Debug)]
pub struct PairedBatch<B: Backend> {
    pub lesion: Tensor<B, 4>,
    pub lesion_labels: Tensor<B, 1, Int>,
    pub lesion_weights: Tensor<B, 4>,
    pub lesion_names: Vec<String>,
    pub normal: Tensor<B, 4>,
    pub normal_labels: Tensor<B, 1, Int>,
    pub normal_weights: Tensor<B, 4>,
    pub normal_names: Vec<String>,
}

pub(crate) fn stack_images<B: Backend>(samples: &[&Sample], shape: [usize; 3], device: &B::Device) -> Tensor<B, 4> {
    let [c, h, w] = shape;
    let pixels: Vec<f32> = samples.iter().flat_map(|s| s.pixels.iter().copied()).collect();
    Tensor::from_data(TensorData::new(pixels, [samples.len(), c, h, w]), device)
}

pub(crate) fn stack_weights<B: Backend>(samples: &[&Sample], shape: [usize; 3], device: &B::Device) -> Tensor<B, 4> {
    let [_, h, w] = shape;
    let weights: Vec<f32> = samples.iter().flat_map(|s| s.weights.iter().copied()).collect();
    Tensor::from_data(TensorData::new(weights, [samples.len(), 1, h, w]), device)
}

pub(crate) fn stack_labels<B: Backend>(samples: &[&Sample], device: &B::Device) -> Tensor<B, 1, Int> {
    let labels: Vec<i64> = samples.iter().map(|s| s.label).collect();
    Tensor::from_data(TensorData::new(labels, [samples.len()]), device)
}

impl<B: Backend> PairedBatch<B> {
    /// Stacks aligned lesion/normal samples into one batch.
    pub fn from_samples(lesion: &[&Sample], normal: &[&Sample], shape: [usize; 3], device: &B::Device) -> Self {
        Self {
            lesion: stack_images(lesion, shape, device),
            lesion_labels: stack_labels(lesion, device),
            lesion_weights: stack_weights(lesion, shape, device),
            lesion_names: lesion.iter().map(|s| s.name.clone()).collect(),
            normal: stack_images(normal, shape, device),
            normal_labels: stack_labels(normal, device),
            normal_weights: stack_weights(normal, shape, device),
            normal_names: normal.iter().map(|s| s.name.clone()).collect(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.lesion.dims()[0]
    }

    /// Checks that both halves agree on batch size and image shape, and that
    /// labels and weight maps line up with the images.
    pub fn validate(&self) -> Result<()> {
        let lesion = self.lesion.dims();
        let normal = self.normal.dims();
        if lesion != normal {
            return Err(DatasetError::BatchShape(format!(
                "lesion images {lesion:?} and normal images {normal:?} differ"
            )));
        }
        let [n, _, h, w] = lesion;

        for (what, labels) in [("lesion", &self.lesion_labels), ("normal", &self.normal_labels)] {
            let [len] = labels.dims();
            if len != n {
                return Err(DatasetError::BatchShape(format!(
                    "{what} labels have {len} entries for {n} images"
                )));
            }
        }

        for (what, weights) in [("lesion", &self.lesion_weights), ("normal", &self.normal_weights)] {
            let dims = weights.dims();
            if dims != [n, 1, h, w] {
                return Err(DatasetError::BatchShape(format!(
                    "{what} weight map {dims:?} does not match images {lesion:?}"
                )));
            }
        }
        Ok(())
    }
}

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::{Backend, Int, Tensor},
    tensor::ElementConversion,
};

use crate::error::{Result, TrainError};

/// Multi-class cross entropy of unnormalised `[N, classes]` logits.
pub fn classification_loss<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Result<Tensor<B, 1>> {
    let [rows, classes] = logits.dims();
    let [n] = labels.dims();
    if rows != n {
        return Err(TrainError::Shape(format!("{rows} logit rows for {n} labels")));
    }

    let min = labels.clone().min().into_scalar().elem::<i64>();
    let max = labels.clone().max().into_scalar().elem::<i64>();
    for label in [min, max] {
        if label < 0 || label as usize >= classes {
            return Err(TrainError::LabelOutOfRange { label, classes });
        }
    }

    let loss = CrossEntropyLossConfig::new().init(&logits.device());
    Ok(loss.forward(logits, labels))
}

/// `mean(weights * |a - b|)`. A single channel weight map is shared by every
/// image channel.
pub fn weighted_reconstruction_loss<B: Backend>(
    a: Tensor<B, 4>,
    b: Tensor<B, 4>,
    weights: Tensor<B, 4>,
) -> Result<Tensor<B, 1>> {
    let dims = a.dims();
    if b.dims() != dims {
        return Err(TrainError::Shape(format!(
            "reconstruction {dims:?} does not match target {:?}",
            b.dims()
        )));
    }

    let [n, c, h, w] = dims;
    let weights = match weights.dims() {
        d if d == dims => weights,
        [wn, 1, wh, ww] if [wn, wh, ww] == [n, h, w] => weights.repeat_dim(1, c),
        d => {
            return Err(TrainError::Shape(format!(
                "weight map {d:?} does not match images {dims:?}"
            )));
        }
    };

    Ok(((a - b).abs() * weights).mean())
}

/// Smoothness penalty `2 * (h_tv / count_h + w_tv / count_w) / N` over squared
/// neighbour differences.
pub fn total_variation_loss<B: Backend>(image: Tensor<B, 4>) -> Tensor<B, 1> {
    let [n, c, h, w] = image.dims();
    let device = image.device();

    let mut tv = Tensor::<B, 1>::zeros([1], &device);
    if h > 1 {
        let diff = image.clone().slice([0..n, 0..c, 1..h, 0..w]) - image.clone().slice([0..n, 0..c, 0..h - 1, 0..w]);
        tv = tv + diff.powi_scalar(2).sum() / (c * (h - 1) * w) as f32;
    }
    if w > 1 {
        let diff = image.clone().slice([0..n, 0..c, 0..h, 1..w]) - image.slice([0..n, 0..c, 0..h, 0..w - 1]);
        tv = tv + diff.powi_scalar(2).sum() / (c * h * (w - 1)) as f32;
    }
    tv * (2.0 / n as f32)
}

/// Wasserstein critic loss on real samples, `-mean(d_real)`.
pub fn critic_real_loss<B: Backend>(d_real: Tensor<B, 2>) -> Tensor<B, 1> {
    d_real.mean().neg()
}

/// Wasserstein critic loss on generated samples, `mean(d_fake)`.
pub fn critic_fake_loss<B: Backend>(d_fake: Tensor<B, 2>) -> Tensor<B, 1> {
    d_fake.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type Backend = NdArray;

    fn scalar(t: Tensor<Backend, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn identical_images_reconstruct_perfectly() {
        let device = Default::default();
        let a = Tensor::<Backend, 4>::random([2, 3, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let w = Tensor::<Backend, 4>::random([2, 1, 4, 4], Distribution::Uniform(0.0, 5.0), &device);
        let loss = weighted_reconstruction_loss(a.clone(), a, w).unwrap();
        assert_eq!(scalar(loss), 0.0);
    }

    #[test]
    fn reconstruction_is_weighted() {
        let device = Default::default();
        let a = Tensor::<Backend, 4>::ones([1, 2, 1, 2], &device);
        let b = Tensor::<Backend, 4>::zeros([1, 2, 1, 2], &device);
        let w = Tensor::<Backend, 4>::from_data(TensorData::new(vec![1.0f32, 3.0], [1, 1, 1, 2]), &device);
        // Per channel |a - b| = 1, weights repeat over both channels.
        let loss = weighted_reconstruction_loss(a, b, w).unwrap();
        assert!((scalar(loss) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn reconstruction_rejects_mismatched_weights() {
        let device = Default::default();
        let a = Tensor::<Backend, 4>::zeros([2, 3, 4, 4], &device);
        let w = Tensor::<Backend, 4>::ones([2, 1, 4, 3], &device);
        let err = weighted_reconstruction_loss(a.clone(), a, w).unwrap_err();
        assert!(matches!(err, TrainError::Shape(_)));
    }

    #[test]
    fn total_variation_of_a_ramp() {
        let device = Default::default();
        // One row ramp 0, 1, 2: horizontal diffs are 1, the vertical term is empty.
        let image = Tensor::<Backend, 4>::from_data(TensorData::new(vec![0.0f32, 1.0, 2.0], [1, 1, 1, 3]), &device);
        let tv = scalar(total_variation_loss(image));
        assert!((tv - 2.0).abs() < 1e-6);

        let flat = Tensor::<Backend, 4>::ones([2, 3, 4, 4], &device);
        assert_eq!(scalar(total_variation_loss(flat)), 0.0);
    }

    #[test]
    fn cross_entropy_is_non_negative() {
        let device = Default::default();
        let logits = Tensor::<Backend, 2>::random([4, 2], Distribution::Normal(0.0, 3.0), &device);
        let labels = Tensor::<Backend, 1, Int>::from_data(TensorData::new(vec![0i64, 1, 1, 0], [4]), &device);
        let loss = scalar(classification_loss(logits, labels).unwrap());
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn labels_outside_the_logits_are_rejected() {
        let device = Default::default();
        let logits = Tensor::<Backend, 2>::zeros([2, 2], &device);
        let labels = Tensor::<Backend, 1, Int>::from_data(TensorData::new(vec![0i64, 2], [2]), &device);
        let err = classification_loss(logits.clone(), labels).unwrap_err();
        assert!(matches!(err, TrainError::LabelOutOfRange { label: 2, classes: 2 }));

        let labels = Tensor::<Backend, 1, Int>::from_data(TensorData::new(vec![0i64, 1, 1], [3]), &device);
        assert!(matches!(classification_loss(logits, labels), Err(TrainError::Shape(_))));
    }

    #[test]
    fn critic_losses_have_opposite_signs() {
        let device = Default::default();
        let scores = Tensor::<Backend, 2>::from_data(TensorData::new(vec![1.0f32, 3.0], [2, 1]), &device);
        assert_eq!(scalar(critic_real_loss(scores.clone())), -2.0);
        assert_eq!(scalar(critic_fake_loss(scores)), 2.0);
    }
}

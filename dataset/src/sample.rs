use crate::error::{DatasetError, Result};
use crate::weight_map::gradient_weight_map;

pub const NORMAL_LABEL: i64 = 0;
pub const LESION_LABEL: i64 = 1;

/// One image with its class label and per-pixel weight map.
#[derive(Clone, Debug)]
pub struct Sample {
    pub name: String,
    /// Normalised pixels, channels-first `[C, H, W]`.
    pub pixels: Vec<f32>,
    /// Gradient weight map `[H, W]`.
    pub weights: Vec<f32>,
    pub label: i64,
}

impl Sample {
    /// Builds a sample from normalised pixels, deriving its weight map.
    pub fn new(name: String, pixels: Vec<f32>, label: i64, shape: [usize; 3], power: i32) -> Self {
        let [c, h, w] = shape;
        let weights = gradient_weight_map(&pixels, c, h, w, power);
        Self {
            name,
            pixels,
            weights,
            label,
        }
    }
}

/// Maps `[0, 1]` intensities to the `[-1, 1]` range the networks train on.
pub fn normalize(value: f32) -> f32 {
    (value - 0.5) / 0.5
}

/// Inverse of [`normalize`], clamped to `[0, 1]`.
pub fn restore(value: f32) -> f32 {
    (value * 0.5 + 0.5).clamp(0.0, 1.0)
}

/// Index-aligned lesion/normal pairs sharing one image shape.
#[derive(Clone, Debug)]
pub struct PairedDataset {
    lesion: Vec<Sample>,
    normal: Vec<Sample>,
    shape: [usize; 3],
}

impl PairedDataset {
    pub fn new(lesion: Vec<Sample>, normal: Vec<Sample>, shape: [usize; 3]) -> Result<Self> {
        let [c, h, w] = shape;
        for sample in lesion.iter().chain(normal.iter()) {
            if sample.pixels.len() != c * h * w {
                return Err(DatasetError::SampleShape {
                    name: sample.name.clone(),
                    reason: format!("expected {} pixels, got {}", c * h * w, sample.pixels.len()),
                });
            }
            if sample.weights.len() != h * w {
                return Err(DatasetError::SampleShape {
                    name: sample.name.clone(),
                    reason: format!("expected {} weights, got {}", h * w, sample.weights.len()),
                });
            }
            if sample.weights.iter().any(|&v| v < 0.0 || !v.is_finite()) {
                return Err(DatasetError::SampleShape {
                    name: sample.name.clone(),
                    reason: "weight map must be finite and non-negative".to_owned(),
                });
            }
        }
        Ok(Self {
            lesion,
            normal,
            shape,
        })
    }

    /// Nr. of usable pairs; extra samples on the longer side are ignored.
    pub fn len(&self) -> usize {
        self.lesion.len().min(self.normal.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `[C, H, W]` shared by every image.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn pair(&self, index: usize) -> (&Sample, &Sample) {
        (&self.lesion[index], &self.normal[index])
    }

    /// Nr. of full batches per epoch, the last partial batch is dropped.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 { 0 } else { self.len() / batch_size }
    }
}

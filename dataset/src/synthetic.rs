use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SyntheticConfig;
use crate::error::Result;
use crate::sample::{LESION_LABEL, NORMAL_LABEL, PairedDataset, Sample, normalize};

/// Deterministic lesion/normal pairs for smoke runs.
///
/// Normal images are smooth shaded backgrounds with mild noise. Each lesion
/// image is its paired normal image with a bright disc painted on top.
pub fn synthetic_dataset(config: &SyntheticConfig) -> Result<PairedDataset> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (c, s) = (config.channels, config.image_size);
    let shape = [c, s, s];

    let mut lesion = Vec::with_capacity(config.pairs);
    let mut normal = Vec::with_capacity(config.pairs);

    for i in 0..config.pairs {
        let tint: Vec<f32> = (0..c).map(|_| rng.random_range(0.3..0.6)).collect();
        let mut pixels = vec![0.0f32; c * s * s];
        for ch in 0..c {
            for y in 0..s {
                for x in 0..s {
                    let shade = 0.2 * (x + y) as f32 / (2 * s) as f32;
                    let noise = rng.random_range(-0.02..0.02);
                    pixels[(ch * s + y) * s + x] = (tint[ch] + shade + noise).clamp(0.0, 1.0);
                }
            }
        }

        let radius = (s as f32 / 6.0).max(1.0);
        let cx = rng.random_range(radius..(s as f32 - radius).max(radius + 1.0));
        let cy = rng.random_range(radius..(s as f32 - radius).max(radius + 1.0));
        let mut spotted = pixels.clone();
        for ch in 0..c {
            for y in 0..s {
                for x in 0..s {
                    let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                    if d <= radius {
                        spotted[(ch * s + y) * s + x] = 0.95;
                    }
                }
            }
        }

        let to_sample = |name: String, px: Vec<f32>, label: i64| {
            Sample::new(name, px.into_iter().map(normalize).collect(), label, shape, config.power)
        };
        normal.push(to_sample(format!("normal_{i:04}.png"), pixels, NORMAL_LABEL));
        lesion.push(to_sample(format!("lesion_{i:04}.png"), spotted, LESION_LABEL));
    }

    PairedDataset::new(lesion, normal, shape)
}

#[cfg(test)]
mod tests {
    use super::synthetic_dataset;
    use crate::config::SyntheticConfig;
    use crate::sample::{LESION_LABEL, NORMAL_LABEL};

    #[test]
    fn generates_requested_pairs() {
        let config = SyntheticConfig::new().with_pairs(5).with_image_size(8);
        let dataset = synthetic_dataset(&config).unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.shape(), [3, 8, 8]);
        let (lesion, normal) = dataset.pair(2);
        assert_eq!(lesion.label, LESION_LABEL);
        assert_eq!(normal.label, NORMAL_LABEL);
        assert!(lesion.pixels.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(lesion.weights.iter().all(|&w| w >= 1.0));
        assert_ne!(lesion.pixels, normal.pixels);
    }

    #[test]
    fn same_seed_same_data() {
        let config = SyntheticConfig::new().with_pairs(2).with_image_size(6);
        let a = synthetic_dataset(&config).unwrap();
        let b = synthetic_dataset(&config).unwrap();
        assert_eq!(a.pair(1).0.pixels, b.pair(1).0.pixels);
    }
}

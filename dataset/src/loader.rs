use std::sync::Arc;

use burn::prelude::Backend;
use rand::SeedableRng;
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;

use crate::batch::PairedBatch;
use crate::error::{DatasetError, Result};
use crate::sample::PairedDataset;

/// Yields fixed-size [`PairedBatch`]es, reshuffling pair order every epoch.
pub struct BatchLoader<B: Backend> {
    dataset: Arc<PairedDataset>,
    batch_size: usize,
    rng: StdRng,
    device: B::Device,
}

impl<B: Backend> BatchLoader<B> {
    pub fn new(dataset: Arc<PairedDataset>, batch_size: usize, seed: u64, device: &B::Device) -> Result<Self> {
        if batch_size == 0 || batch_size > dataset.len() {
            return Err(DatasetError::BatchSize {
                batch_size,
                pairs: dataset.len(),
            });
        }
        Ok(Self {
            dataset,
            batch_size,
            rng: StdRng::seed_from_u64(seed),
            device: device.clone(),
        })
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.num_batches(self.batch_size)
    }

    /// Draws a fresh pair order and returns an iterator over one epoch.
    pub fn epoch(&mut self) -> EpochBatches<'_, B> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        order.shuffle(&mut self.rng);
        EpochBatches {
            loader: self,
            order,
            next: 0,
        }
    }

    /// Batches in dataset order, used for validation.
    pub fn ordered(&self, max_batches: usize) -> Vec<PairedBatch<B>> {
        let order: Vec<usize> = (0..self.dataset.len()).collect();
        order
            .chunks_exact(self.batch_size)
            .take(max_batches)
            .map(|chunk| self.batch_from(chunk))
            .collect()
    }

    fn batch_from(&self, indices: &[usize]) -> PairedBatch<B> {
        let (lesion, normal): (Vec<_>, Vec<_>) = indices.iter().map(|&i| self.dataset.pair(i)).unzip();
        PairedBatch::from_samples(&lesion, &normal, self.dataset.shape(), &self.device)
    }
}

pub struct EpochBatches<'a, B: Backend> {
    loader: &'a BatchLoader<B>,
    order: Vec<usize>,
    next: usize,
}

impl<B: Backend> Iterator for EpochBatches<'_, B> {
    type Item = PairedBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next * self.loader.batch_size;
        let end = start + self.loader.batch_size;
        // Drop the last partial batch.
        if end > self.order.len() {
            return None;
        }
        self.next += 1;
        Some(self.loader.batch_from(&self.order[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::BatchLoader;
    use crate::error::DatasetError;
    use crate::sample::{LESION_LABEL, NORMAL_LABEL, PairedDataset, Sample};
    use burn::backend::NdArray;
    use std::sync::Arc;

    type Backend = NdArray;

    fn dataset(pairs: usize) -> Arc<PairedDataset> {
        let make = |prefix: &str, label: i64| -> Vec<Sample> {
            (0..pairs)
                .map(|i| Sample::new(format!("{prefix}{i}"), vec![i as f32; 4], label, [1, 2, 2], 2))
                .collect()
        };
        Arc::new(PairedDataset::new(make("l", LESION_LABEL), make("n", NORMAL_LABEL), [1, 2, 2]).unwrap())
    }

    #[test]
    fn drops_partial_batch_and_keeps_pairs_aligned() {
        let device = Default::default();
        let mut loader = BatchLoader::<Backend>::new(dataset(7), 3, 1, &device).unwrap();
        assert_eq!(loader.batches_per_epoch(), 2);

        let batches: Vec<_> = loader.epoch().collect();
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.batch_size(), 3);
            for (l, n) in batch.lesion_names.iter().zip(&batch.normal_names) {
                assert_eq!(l[1..], n[1..]);
            }
        }
    }

    #[test]
    fn order_is_reshuffled_between_epochs() {
        let device = Default::default();
        let mut loader = BatchLoader::<Backend>::new(dataset(32), 32, 7, &device).unwrap();
        let first: Vec<String> = loader.epoch().flat_map(|b| b.lesion_names).collect();
        let second: Vec<String> = loader.epoch().flat_map(|b| b.lesion_names).collect();

        assert_ne!(first, second);
        let mut a = first.clone();
        let mut b = second.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_oversized_batch() {
        let device = Default::default();
        let err = BatchLoader::<Backend>::new(dataset(2), 3, 1, &device).err().unwrap();
        assert!(matches!(err, DatasetError::BatchSize { .. }));
    }

    #[test]
    fn ordered_batches_follow_dataset_order() {
        let device = Default::default();
        let loader = BatchLoader::<Backend>::new(dataset(5), 2, 1, &device).unwrap();
        let batches = loader.ordered(3);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].lesion_names, vec!["l2", "l3"]);
    }
}

use crate::msg::LossSnapshot;

/// Formatted loss lines, kept only every `interval` batches.
#[derive(Clone, Debug, Default)]
pub struct RunLog {
    interval: usize,
    lines: Vec<String>,
}

impl RunLog {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            lines: Vec::new(),
        }
    }

    pub fn should_log(&self, batch_idx: usize) -> bool {
        batch_idx % self.interval == 0
    }

    /// Appends the snapshot when its batch lands on the interval. Returns
    /// whether it was kept.
    pub fn record(&mut self, snapshot: &LossSnapshot) -> bool {
        if !self.should_log(snapshot.batch_idx) {
            return false;
        }
        self.lines.push(snapshot.to_string());
        true
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub const DEFAULT_BINS: usize = 60;

/// Critic scores of real and generated images collected during validation.
#[derive(Clone, Debug, Default)]
pub struct ScoreRecord {
    pub real: Vec<f32>,
    pub fake: Vec<f32>,
}

/// Histogram of both score sets over shared bins.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreHistogram {
    /// `bins + 1` ascending edges.
    pub edges: Vec<f32>,
    pub real: Vec<usize>,
    pub fake: Vec<usize>,
}

impl ScoreRecord {
    pub fn extend(&mut self, real: impl IntoIterator<Item = f32>, fake: impl IntoIterator<Item = f32>) {
        self.real.extend(real);
        self.fake.extend(fake);
    }

    pub fn len(&self) -> usize {
        self.real.len() + self.fake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mean_real(&self) -> f32 {
        mean(&self.real)
    }

    pub fn mean_fake(&self) -> f32 {
        mean(&self.fake)
    }

    pub fn histogram(&self, bins: usize) -> ScoreHistogram {
        let bins = bins.max(1);
        let finite = self.real.iter().chain(&self.fake).copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let (lo, hi) = if lo > hi {
            (0.0, 1.0)
        } else if lo == hi {
            (lo - 0.5, hi + 0.5)
        } else {
            (lo, hi)
        };

        let width = (hi - lo) / bins as f32;
        let edges = (0..=bins).map(|i| lo + width * i as f32).collect();
        let count = |values: &[f32]| {
            let mut counts = vec![0usize; bins];
            for &v in values.iter().filter(|v| v.is_finite()) {
                let bin = (((v - lo) / width) as usize).min(bins - 1);
                counts[bin] += 1;
            }
            counts
        };

        ScoreHistogram {
            edges,
            real: count(&self.real),
            fake: count(&self.fake),
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

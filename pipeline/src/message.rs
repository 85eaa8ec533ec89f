use std::path::PathBuf;
use std::time::Duration;

use train::msg::LossSnapshot;
use train::stats::ScoreHistogram;

#[derive(Debug, Clone)]
pub enum PipelineMessage {
    /// Data is loaded and the networks are built.
    Started {
        pairs: usize,
        batches_per_epoch: usize,
        total_epochs: usize,
    },
    /// Losses of a step that landed on the logging interval.
    TrainStep {
        snapshot: Box<LossSnapshot>,
        total_elapsed: Duration,
    },
    EvalResult {
        epoch: usize,
        mean_real_score: f32,
        mean_fake_score: f32,
        avg_ssim: f32,
        histogram: ScoreHistogram,
    },
    /// Parameters of all three networks were written to `dir`.
    Checkpoint { epoch: usize, dir: PathBuf },
    Finished { log_path: PathBuf },
}

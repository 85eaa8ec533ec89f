use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_fn_stream::TryStreamEmitter;
use async_trait::async_trait;
use burn::module::AutodiffModule;
use burn::prelude::{Backend, Config, Tensor};
use burn::tensor::Distribution;
use burn::tensor::backend::AutodiffBackend;
use dataset::{BatchLoader, PairedDataset, load_dataset, synthetic_dataset};
use models::{Discriminator, ResidualClassifier, UNet};
use train::eval::eval_batch;
use train::penalty::check_critic_gradient;
use train::stats::ScoreRecord;
use train::{Networks, StepContext, UdcTrainer};

use crate::checkpoint::{load_module, save_networks};
use crate::config::{DataSource, PipelineConfig, UdcConfig};
use crate::eval_export::{save_eval_panels, save_score_distribution};
use crate::message::PipelineMessage;
use crate::pipeline_stream::PipelineStream;

/// Allowed relative disagreement between the critic's input gradient and autodiff.
const CRITIC_GRADIENT_TOLERANCE: f32 = 1e-3;

type UdcNetworks<B> = Networks<UNet<B>, Discriminator<B>, ResidualClassifier<B>>;

/// Trains the generator, critic and classifier on a paired dataset.
pub struct TrainStream<B: AutodiffBackend> {
    config: UdcConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> TrainStream<B> {
    pub fn new(config: UdcConfig, device: B::Device) -> Self {
        Self { config, device }
    }
}

async fn load_data(config: &UdcConfig, source: &DataSource) -> anyhow::Result<PairedDataset> {
    let dataset = match source {
        DataSource::Synthetic => {
            log::info!("Generating {} synthetic pairs", config.synthetic.pairs);
            synthetic_dataset(&config.synthetic)?
        }
        DataSource::Directory(root) => {
            log::info!("Loading dataset from {}", root.display());
            load_dataset(root.clone(), &config.load)
                .await
                .with_context(|| format!("Failed to load dataset from {}", root.display()))?
        }
    };
    Ok(dataset)
}

fn init_networks<B: AutodiffBackend>(config: &UdcConfig, device: &B::Device) -> anyhow::Result<UdcNetworks<B>> {
    let mut generator = config.generator.init::<B>(device)?;
    if let Some(path) = &config.pipeline.pretrained_generator {
        log::info!("Loading generator parameters from {path}");
        generator = load_module::<B, _>(generator, Path::new(path), device)
            .with_context(|| format!("Failed to load generator parameters from {path}"))?;
    }
    Ok(Networks {
        generator,
        critic: config.critic.init::<B>(device)?,
        classifier: config.classifier.init::<B>(device)?,
    })
}

/// Scores the ordered validation batches, exports panels and the score
/// histogram, then checkpoints all networks under `epoch_{epoch}`.
async fn validate_epoch<B: AutodiffBackend>(
    epoch: usize,
    nets: &UdcNetworks<B>,
    loader: &BatchLoader<B::InnerBackend>,
    config: &PipelineConfig,
    export_path: &Path,
    emitter: &TryStreamEmitter<PipelineMessage, anyhow::Error>,
) -> anyhow::Result<()> {
    log::info!("Running validation for epoch {epoch}");

    let generator = nets.generator.valid();
    let critic = nets.critic.valid();
    let epoch_dir = export_path.join(format!("epoch_{epoch}"));

    let mut record = ScoreRecord::default();
    let mut ssim = 0.0;
    let mut count = 0;
    let mut panels = 0;
    for batch in loader.ordered(config.eval_batches) {
        let sample = eval_batch(&generator, &critic, &batch);
        count += 1;
        ssim += sample.ssim;
        record.extend(sample.real_scores.iter().copied(), sample.fake_scores.iter().copied());
        panels += save_eval_panels(&sample, &epoch_dir, config.debug)
            .await
            .context("Failed to save validation panels.")?;
    }
    let avg_ssim = if count > 0 { ssim / count as f32 } else { 0.0 };
    save_score_distribution(&record, &epoch_dir.join("score_distribution.csv")).await?;

    log::info!(
        "Epoch {epoch}: mean real score {:.4}, mean fake score {:.4}, ssim {avg_ssim:.4}, {panels} panels",
        record.mean_real(),
        record.mean_fake(),
    );
    emitter
        .emit(PipelineMessage::EvalResult {
            epoch,
            mean_real_score: record.mean_real(),
            mean_fake_score: record.mean_fake(),
            avg_ssim,
            histogram: record.histogram(train::stats::DEFAULT_BINS),
        })
        .await;

    tokio::fs::create_dir_all(&epoch_dir).await?;
    save_networks::<B, _, _, _>(nets, &epoch_dir, "")?;
    emitter
        .emit(PipelineMessage::Checkpoint { epoch, dir: epoch_dir })
        .await;
    Ok(())
}

#[async_trait(?Send)]
impl<B: AutodiffBackend> PipelineStream for TrainStream<B> {
    async fn run(&mut self, emitter: TryStreamEmitter<PipelineMessage, anyhow::Error>) -> anyhow::Result<()> {
        let config = &self.config;
        // Fail on bad settings before loading data or building networks.
        let source = config.validate()?;
        let pipeline = &config.pipeline;
        let train_config = &config.train;

        let dataset = Arc::new(load_data(config, &source).await?);

        log::info!("Using seed {}", pipeline.seed);
        <B as Backend>::seed(pipeline.seed);

        let mut nets = init_networks::<B>(config, &self.device)?;

        let [channels, height, width] = dataset.shape();
        let probe = Tensor::<B, 4>::random(
            [1, channels, height, width],
            Distribution::Uniform(-1.0, 1.0),
            &self.device,
        );
        check_critic_gradient(&nets.critic, probe, CRITIC_GRADIENT_TOLERANCE)
            .context("Critic input gradient disagrees with autodiff.")?;

        let export_path = PathBuf::from(&pipeline.export_path);
        tokio::fs::create_dir_all(&export_path).await?;
        save_networks::<B, _, _, _>(&nets, &export_path, "init_")?;
        config.save(export_path.join("para.json"))?;

        let mut loader = BatchLoader::<B>::new(dataset.clone(), train_config.batch_size, pipeline.seed, &self.device)?;
        let eval_loader = BatchLoader::<B::InnerBackend>::new(dataset.clone(), train_config.batch_size, pipeline.seed, &self.device)?;
        let batches_per_epoch = loader.batches_per_epoch();
        let epochs = train_config.epochs;
        let mut trainer = UdcTrainer::<B, UNet<B>, Discriminator<B>, ResidualClassifier<B>>::new(train_config)?;

        emitter
            .emit(PipelineMessage::Started {
                pairs: dataset.len(),
                batches_per_epoch,
                total_epochs: epochs,
            })
            .await;

        let mut train_duration = Duration::from_secs(0);
        log::info!("Start training loop.");
        for epoch in 1..=epochs {
            trainer.advance_epoch();
            log::info!("Epoch {epoch} of {epochs}, lr {:e}", trainer.lr());

            for (i, batch) in loader.epoch().enumerate() {
                let step_time = Instant::now();
                let ctx = StepContext::new(epoch, epochs, i + 1, batches_per_epoch);
                let (new_nets, stats) = trainer.step(nets, &batch, ctx)?;
                nets = new_nets;
                // Emitting might pause, so it's not counted in the training time.
                train_duration += step_time.elapsed();

                if stats.logged {
                    emitter
                        .emit(PipelineMessage::TrainStep {
                            snapshot: Box::new(stats.snapshot),
                            total_elapsed: train_duration,
                        })
                        .await;
                }
            }

            if pipeline.debug || epoch % pipeline.eval_every == 0 || epoch == epochs {
                validate_epoch(epoch, &nets, &eval_loader, pipeline, &export_path, &emitter).await?;
            }
        }

        let log_path = export_path.join("log.txt");
        let mut log_text = trainer.run_log().lines().join("\n");
        log_text.push('\n');
        tokio::fs::write(&log_path, log_text).await?;

        emitter.emit(PipelineMessage::Finished { log_path }).await;
        Ok(())
    }
}

use std::path::PathBuf;

use clap::Parser;
use futures::StreamExt;
use pipeline::{PipelineMessage, PipelineStream, TrainStream, UdcConfig};
use train::config::WGAN_GP;

#[cfg(not(feature = "wgpu"))]
type MainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type MainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Trains a lesion-removing generator against a critic and a classifier.
#[derive(Parser)]
#[command(name = "udc")]
struct Args {
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    #[arg(long, default_value_t = 350)]
    epochs: usize,

    /// Initial learning rate of all three optimizers.
    #[arg(long, default_value_t = 2e-4)]
    lr: f64,

    /// First Adam moment of the generator and critic optimizers.
    #[arg(long, default_value_t = 0.0)]
    beta1: f32,

    /// Log every this many batches.
    #[arg(long, default_value_t = 20)]
    interval: usize,

    /// Output directory for parameters, panels and logs.
    #[arg(long, default_value = "./outputs")]
    prefix: PathBuf,

    /// Weight of the generator's adversarial loss.
    #[arg(long, default_value_t = 1.0)]
    alpha: f32,

    /// Weight of the reconstruction loss.
    #[arg(long, default_value_t = 0.2)]
    lmbda: f32,

    /// Weight of the classification loss.
    #[arg(long, default_value_t = 1.0)]
    sigma: f32,

    /// Weight of the L1 terms in the adversarial stage.
    #[arg(long, default_value_t = 1e-4)]
    gamma: f32,

    /// Weight of the total variation term.
    #[arg(long, default_value_t = 0.1)]
    theta: f32,

    /// Gradient penalty coefficient.
    #[arg(long, default_value_t = 10.0)]
    eta: f32,

    /// Global steps before the generator receives critic feedback.
    #[arg(long, default_value_t = 0)]
    pretrained_steps: usize,

    /// Per-epoch learning rate decay factor.
    #[arg(long, default_value_t = 1.0)]
    lr_decay: f64,

    /// Exponent of the gradient weight map.
    #[arg(long, default_value_t = 2)]
    power: i32,

    /// Dataset directory with lesion/ and normal/ folders, or `synthetic`.
    #[arg(long, default_value = "synthetic")]
    data: String,

    #[arg(long, default_value = WGAN_GP)]
    training_strategy: String,

    /// Generator parameters saved by a previous run.
    #[arg(long)]
    pretrained_generator: Option<String>,

    /// Nr. of pooling levels in the U-Net.
    #[arg(long, default_value_t = 4)]
    u_depth: usize,

    /// Nr. of stride-2 layers in the critic.
    #[arg(long, default_value_t = 4)]
    d_depth: usize,

    #[arg(long, default_value_t = 128)]
    image_size: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Validate every epoch and export one panel per batch.
    #[arg(long)]
    debug: bool,

    /// Validate every this many epochs.
    #[arg(long, default_value_t = 50)]
    eval_every: usize,
}

impl Args {
    fn into_config(self) -> UdcConfig {
        let mut config = UdcConfig::new().with_image_size(self.image_size);

        let train = &mut config.train;
        train.batch_size = self.batch_size;
        train.epochs = self.epochs;
        train.lr = self.lr;
        train.beta1 = self.beta1;
        train.interval = self.interval;
        train.alpha = self.alpha;
        train.lmbda = self.lmbda;
        train.sigma = self.sigma;
        train.gamma = self.gamma;
        train.theta = self.theta;
        train.gp_weight = self.eta;
        train.pretrained_steps = self.pretrained_steps;
        train.lr_decay = self.lr_decay;
        train.training_strategy = self.training_strategy;
        train.seed = self.seed;

        let pipeline = &mut config.pipeline;
        pipeline.seed = self.seed;
        pipeline.debug = self.debug;
        pipeline.eval_every = self.eval_every;
        pipeline.export_path = self.prefix.to_string_lossy().into_owned();
        pipeline.data = self.data;
        pipeline.pretrained_generator = self.pretrained_generator;

        config.load.power = self.power;
        config.synthetic.power = self.power;
        config.synthetic.seed = self.seed;
        config.generator.depth = self.u_depth;
        config.critic.downsampling = self.d_depth;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Args::parse().into_config();
    let device = Default::default();
    let mut train = TrainStream::<MainBackend>::new(config, device);

    let stream = train.launch();
    futures::pin_mut!(stream);
    while let Some(message) = stream.next().await {
        match message? {
            PipelineMessage::Started {
                pairs,
                batches_per_epoch,
                total_epochs,
            } => {
                log::info!("Training on {pairs} pairs, {batches_per_epoch} batches per epoch, {total_epochs} epochs");
            }
            PipelineMessage::TrainStep { .. } => {}
            PipelineMessage::EvalResult {
                epoch,
                mean_real_score,
                mean_fake_score,
                avg_ssim,
                ..
            } => {
                println!("epoch {epoch}: real {mean_real_score:.4}, fake {mean_fake_score:.4}, ssim {avg_ssim:.4}");
            }
            PipelineMessage::Checkpoint { dir, .. } => {
                log::info!("Checkpoint written to {}", dir.display());
            }
            PipelineMessage::Finished { log_path } => {
                println!("Finished, run log at {}", log_path.display());
            }
        }
    }
    Ok(())
}

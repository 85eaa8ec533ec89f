use burn::prelude::Config;

/// The only adversarial objective this trainer implements.
pub const WGAN_GP: &str = "wgan-gp";

#[derive(Config, Debug)]
pub struct TrainConfig {
    #[config(default = 64)]
    pub batch_size: usize,

    /// Total number of epochs to train for.
    #[config(default = 350)]
    pub epochs: usize,

    /// Start learning rate shared by all three optimizers.
    #[config(default = 2e-4)]
    pub lr: f64,

    /// First Adam moment coefficient of the generator and critic.
    #[config(default = 0.0)]
    pub beta1: f32,

    /// Per-epoch learning rate decay factor.
    #[config(default = 1.0)]
    pub lr_decay: f64,

    /// Weight of the weighted L1 reconstruction loss in the joint step.
    #[config(default = 0.2)]
    pub lmbda: f32,

    /// Weight of the classification loss in the joint step.
    #[config(default = 1.0)]
    pub sigma: f32,

    /// Weight of the adversarial loss in the generator step.
    #[config(default = 1.0)]
    pub alpha: f32,

    /// Weight of the normal and lesion L1 losses in the generator step.
    #[config(default = 1e-4)]
    pub gamma: f32,

    /// Weight of the total variation loss in the generator step.
    #[config(default = 0.1)]
    pub theta: f32,

    /// Gradient penalty coefficient (`eta`).
    #[config(default = 10.0)]
    pub gp_weight: f32,

    /// Nr. of steps before the generator starts training against the critic.
    #[config(default = 0)]
    pub pretrained_steps: usize,

    /// Log every `interval` batches.
    #[config(default = 20)]
    pub interval: usize,

    #[config(default = "String::from(WGAN_GP)")]
    pub training_strategy: String,

    #[config(default = 42)]
    pub seed: u64,
}

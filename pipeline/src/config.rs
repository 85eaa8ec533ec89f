use std::path::{Path, PathBuf};

use burn::prelude::Config;
use dataset::{LoadConfig, SyntheticConfig, is_dataset_dir};
use models::{ClassifierConfig, DiscriminatorConfig, UNetConfig};
use train::config::{TrainConfig, WGAN_GP};

use crate::error::PipelineError;

/// Dataset identifier that selects the generated toy dataset.
pub const SYNTHETIC: &str = "synthetic";

#[derive(Config, Debug)]
pub struct PipelineConfig {
    /// Random seed.
    #[config(default = 42)]
    pub seed: u64,

    /// Validate every this many epochs. The last epoch is always validated.
    #[config(default = 50)]
    pub eval_every: usize,

    /// Validate every epoch and export a single panel per batch.
    #[config(default = false)]
    pub debug: bool,

    /// Nr. of ordered batches used for validation.
    #[config(default = 3)]
    pub eval_batches: usize,

    /// Location to put exported files. By default uses the cwd.
    ///
    /// This path can be set to be relative to the CWD.
    #[config(default = "String::from(\".\")")]
    pub export_path: String,

    /// `synthetic` or a directory holding `lesion/` and `normal/` folders.
    #[config(default = "String::from(SYNTHETIC)")]
    pub data: String,

    /// Generator parameters to start from, as saved by a previous run.
    pub pretrained_generator: Option<String>,
}

/// Where training images come from.
#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    Synthetic,
    Directory(PathBuf),
}

impl DataSource {
    pub fn parse(data: &str) -> crate::error::Result<Self> {
        if data == SYNTHETIC {
            return Ok(Self::Synthetic);
        }
        let path = Path::new(data);
        if is_dataset_dir(path) {
            Ok(Self::Directory(path.to_path_buf()))
        } else {
            Err(PipelineError::UnsupportedDataset(data.to_owned()))
        }
    }
}

/// Every setting of a run. Saved next to the outputs as `para.json`.
#[derive(Config, Debug)]
pub struct UdcConfig {
    #[config(default = "TrainConfig::new()")]
    pub train: TrainConfig,
    #[config(default = "PipelineConfig::new()")]
    pub pipeline: PipelineConfig,
    #[config(default = "LoadConfig::new()")]
    pub load: LoadConfig,
    #[config(default = "SyntheticConfig::new()")]
    pub synthetic: SyntheticConfig,
    #[config(default = "UNetConfig::new()")]
    pub generator: UNetConfig,
    #[config(default = "DiscriminatorConfig::new()")]
    pub critic: DiscriminatorConfig,
    #[config(default = "ClassifierConfig::new()")]
    pub classifier: ClassifierConfig,
}

impl UdcConfig {
    /// Sets the image size of the data source and every network at once.
    pub fn with_image_size(mut self, size: usize) -> Self {
        self.load.image_size = size as u32;
        self.synthetic.image_size = size;
        self.critic.image_size = size;
        self
    }

    /// Sets the channel count of the synthetic data and every network at once.
    /// Images loaded from disk are always RGB.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.synthetic.channels = channels;
        self.generator.in_channels = channels;
        self.critic.in_channels = channels;
        self.classifier.in_channels = channels;
        self
    }

    /// Image shape `[channels, size, size]` the data source will produce.
    pub fn data_shape(&self, source: &DataSource) -> [usize; 3] {
        match source {
            DataSource::Synthetic => [
                self.synthetic.channels,
                self.synthetic.image_size,
                self.synthetic.image_size,
            ],
            DataSource::Directory(_) => {
                let size = self.load.image_size as usize;
                [3, size, size]
            }
        }
    }

    /// Checks everything that can be checked before touching data or
    /// building networks.
    pub fn validate(&self) -> crate::error::Result<DataSource> {
        if self.train.training_strategy != WGAN_GP {
            return Err(PipelineError::UnsupportedStrategy(self.train.training_strategy.clone()));
        }
        let source = DataSource::parse(&self.pipeline.data)?;

        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.train.batch_size == 0 {
            return invalid("batch size must be at least 1".into());
        }
        if self.train.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        if self.train.interval == 0 {
            return invalid("logging interval must be at least 1".into());
        }
        if self.pipeline.eval_every == 0 {
            return invalid("eval_every must be at least 1".into());
        }

        self.generator.validate()?;
        self.critic.validate()?;
        self.classifier.validate()?;

        let [channels, size, _] = self.data_shape(&source);
        for (name, net_channels) in [
            ("generator", self.generator.in_channels),
            ("critic", self.critic.in_channels),
            ("classifier", self.classifier.in_channels),
        ] {
            if net_channels != channels {
                return invalid(format!("{name} expects {net_channels} channels, data has {channels}"));
            }
        }
        if self.critic.image_size != size {
            return invalid(format!(
                "critic expects {0}x{0} images, data is {1}x{1}",
                self.critic.image_size, size
            ));
        }
        if !self.generator.supports_size(size) {
            return invalid(format!(
                "generator of depth {} cannot process {size}x{size} images",
                self.generator.depth
            ));
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> UdcConfig {
        UdcConfig::new().with_image_size(16)
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(small().validate().unwrap(), DataSource::Synthetic);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let mut config = small();
        config.train.training_strategy = "vanilla".into();
        assert!(matches!(config.validate(), Err(PipelineError::UnsupportedStrategy(s)) if s == "vanilla"));
    }

    #[test]
    fn rejects_unknown_dataset() {
        let mut config = small();
        config.pipeline.data = "/definitely/not/a/dataset".into();
        assert!(matches!(config.validate(), Err(PipelineError::UnsupportedDataset(_))));
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut config = small();
        config.train.interval = 0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(msg)) if msg.contains("interval")));

        let mut config = small();
        config.pipeline.eval_every = 0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let mut config = small();
        config.critic.image_size = 32;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        let config = UdcConfig::new().with_image_size(24);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_channels() {
        let mut config = small().with_channels(1);
        assert!(config.validate().is_ok());
        config.classifier.in_channels = 3;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn directory_is_a_dataset_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(dataset::LESION_DIR)).unwrap();
        std::fs::create_dir(dir.path().join(dataset::NORMAL_DIR)).unwrap();
        let source = DataSource::parse(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(source, DataSource::Directory(dir.path().to_path_buf()));
    }
}

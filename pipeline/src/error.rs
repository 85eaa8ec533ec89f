use burn::record::RecorderError;
use dataset::DatasetError;
use models::ModelError;
use thiserror::Error;
use train::TrainError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported training strategy `{0}`, only `wgan-gp` is available")]
    UnsupportedStrategy(String),

    #[error("Unsupported dataset `{0}`, expected `synthetic` or a directory with lesion/ and normal/ folders")]
    UnsupportedDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load dataset: {0}")]
    DatasetError(#[from] DatasetError),

    #[error(transparent)]
    ModelError(#[from] ModelError),

    #[error(transparent)]
    TrainError(#[from] TrainError),

    #[error("Failed to record parameters: {0}")]
    RecorderError(#[from] RecorderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

use dataset::DatasetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: i64, classes: usize },

    #[error("Critic gradient failed: {0}")]
    CriticGradient(String),

    #[error("Invalid learning rate schedule: {0}")]
    Schedule(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

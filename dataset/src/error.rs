use std::path::PathBuf;
use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("File IO error: {0}")]
    File(#[from] tokio::io::Error),

    #[error("Image error: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Image {0} has no usable file name")]
    InvalidName(PathBuf),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to load format: {0}")]
    FormatError(#[from] FormatError),

    #[error("Dataset directory {0} is missing the `{1}` folder")]
    MissingFolder(PathBuf, &'static str),

    #[error("No images found in {0}")]
    Empty(PathBuf),

    #[error("Sample {name} does not match the dataset shape: {reason}")]
    SampleShape { name: String, reason: String },

    #[error("Batch shape mismatch: {0}")]
    BatchShape(String),

    #[error("Batch size must be non-zero and at most the number of pairs ({pairs}), got {batch_size}")]
    BatchSize { batch_size: usize, pairs: usize },
}

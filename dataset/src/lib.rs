mod batch;
mod config;
mod error;
mod filesystem;
mod formats;
mod loader;
mod sample;
mod synthetic;
mod weight_map;

pub use batch::PairedBatch;
pub use config::{LoadConfig, SyntheticConfig};
pub use error::{DatasetError, FormatError};
pub use formats::{LESION_DIR, NORMAL_DIR, is_dataset_dir, load_dataset};
pub use loader::{BatchLoader, EpochBatches};
pub use sample::{LESION_LABEL, NORMAL_LABEL, PairedDataset, Sample, normalize, restore};
pub use synthetic::synthetic_dataset;
pub use weight_map::gradient_weight_map;

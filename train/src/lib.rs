#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod eval;
pub mod loss;
pub mod msg;
pub mod optim;
pub mod penalty;
pub mod stats;
pub mod train;

mod ssim;

pub use error::TrainError;
pub use train::{Networks, StepContext, UdcTrainer};

pub mod checkpoint;
pub mod config;
pub mod eval_export;
pub mod message;
pub mod pipeline_stream;
pub mod train_stream;

mod error;

pub use config::{DataSource, PipelineConfig, UdcConfig};
pub use error::{PipelineError, Result};
pub use message::PipelineMessage;
pub use pipeline_stream::PipelineStream;
pub use train_stream::TrainStream;

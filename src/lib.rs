pub mod batch;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod global;
pub mod labeling;
pub mod recording;
pub mod summarize;
pub mod transcript;
pub mod transcription;

pub use error::PipelineError;

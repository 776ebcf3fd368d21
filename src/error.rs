//! Typed pipeline errors.
//!
//! Domain failures are expressed as `PipelineError` so callers (and the CLI
//! exit-code mapping) can tell them apart. Plumbing failures stay on
//! `anyhow::Error` with context, and `main` downcasts to recover the typed
//! variant when one is present.

use std::path::PathBuf;
use thiserror::Error;

/// Stage of the remote transcription exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStage {
    Upload,
    Job,
    Poll,
    PollTimeout,
    Remote,
}

impl ProviderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Job => "job",
            Self::Poll => "poll",
            Self::PollTimeout => "poll-timeout",
            Self::Remote => "remote-error",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a recording session is already in progress")]
    AlreadyRecording,

    #[error("no recording session is in progress")]
    NoActiveRecording,

    #[error("transcription provider failed during {}: {message}", stage.as_str())]
    Provider {
        stage: ProviderStage,
        message: String,
    },

    #[error("unknown speaker id '{0}' in transcript")]
    UnknownSpeaker(String),

    #[error("labeling incomplete: {unnamed} speaker(s) still unnamed")]
    LabelingIncomplete { unnamed: usize },

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("registry integrity violation: {0}")]
    StoreIntegrity(String),

    #[error("watch directory does not exist: {}", .0.display())]
    WatchDirMissing(PathBuf),
}

impl PipelineError {
    /// Stable process exit code for each error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ArtifactNotFound(_) => 2,
            Self::WatchDirMissing(_) => 3,
            Self::AlreadyRecording => 10,
            Self::NoActiveRecording => 11,
            Self::Provider { stage, .. } => match stage {
                ProviderStage::Upload => 20,
                ProviderStage::Job => 21,
                ProviderStage::Poll => 22,
                ProviderStage::Remote => 23,
                ProviderStage::PollTimeout => 24,
            },
            Self::UnknownSpeaker(_) => 30,
            Self::LabelingIncomplete { .. } => 31,
            Self::Summarization(_) => 40,
            Self::StoreIntegrity(_) => 50,
        }
    }
}

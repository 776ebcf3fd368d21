//! Remote transcription provider contract.
//!
//! The orchestrator drives upload, job submission, and polling against
//! this trait so the remote wire details stay out of the pipeline
//! state machine (and so tests can script a provider).

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

mod assembly_api;

pub use assembly_api::AssemblyAiProvider;

/// One diarized utterance as delivered by the provider. Times are in
/// milliseconds; normalization to seconds happens in the orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderUtterance {
    pub speaker: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Observed state of a remote transcription job.
#[derive(Debug, Clone)]
pub enum JobState {
    Queued,
    Processing,
    Completed {
        utterances: Vec<ProviderUtterance>,
        duration_seconds: u64,
    },
    Error {
        message: String,
    },
}

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upload raw audio, returning an opaque reference for job submission.
    async fn upload(&self, audio_path: &Path) -> Result<String>;

    /// Create a transcription job (with speaker diarization) for an
    /// uploaded artifact, returning the job id.
    async fn submit_job(&self, upload_ref: &str) -> Result<String>;

    /// Query the current state of a job.
    async fn poll_job(&self, job_id: &str) -> Result<JobState>;
}

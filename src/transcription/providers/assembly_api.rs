//! AssemblyAI transcription provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info};

use super::{JobState, ProviderUtterance, TranscriptionProvider};
use crate::error::{PipelineError, ProviderStage};

/// Response from the upload endpoint
#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Request body for creating a transcript
#[derive(Debug, Serialize)]
struct TranscriptRequest {
    audio_url: String,
    speaker_labels: bool,
}

/// Response from transcript creation and polling
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    #[serde(default)]
    utterances: Option<Vec<AssemblyUtterance>>,
    #[serde(default)]
    audio_duration: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssemblyUtterance {
    speaker: String,
    start: u64,
    end: u64,
    text: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

pub struct AssemblyAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AssemblyAiProvider {
    pub fn new(api_key: String, endpoint: Option<String>) -> Self {
        let base_url = endpoint.unwrap_or_else(|| "https://api.assemblyai.com/v2".to_string());

        info!(
            "Initialized AssemblyAI provider with base URL: {}",
            base_url
        );

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    fn stage_error(stage: ProviderStage, message: impl Into<String>) -> anyhow::Error {
        PipelineError::Provider {
            stage,
            message: message.into(),
        }
        .into()
    }
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiProvider {
    fn name(&self) -> &'static str {
        "AssemblyAI"
    }

    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let upload_url = format!("{}/upload", self.base_url);

        debug!("Uploading audio file to AssemblyAI: {:?}", audio_path);

        let audio_data = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {:?}", audio_path))?;

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(audio_data)
            .send()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Upload, e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Upload, e.to_string()))?;

        if !status.is_success() {
            error!(
                "AssemblyAI upload failed with status {}: {}",
                status, response_text
            );
            return Err(Self::stage_error(
                ProviderStage::Upload,
                format!("status {status}: {response_text}"),
            ));
        }

        let upload_response: UploadResponse =
            serde_json::from_str(&response_text).context("Failed to parse upload response")?;

        debug!("Audio uploaded: {}", upload_response.upload_url);
        Ok(upload_response.upload_url)
    }

    async fn submit_job(&self, upload_ref: &str) -> Result<String> {
        let transcript_url = format!("{}/transcript", self.base_url);

        let request_body = TranscriptRequest {
            audio_url: upload_ref.to_string(),
            speaker_labels: true,
        };

        debug!("Submitting transcription job with speaker diarization");

        let response = self
            .client
            .post(&transcript_url)
            .header("Authorization", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Job, e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Job, e.to_string()))?;

        if !status.is_success() {
            error!(
                "AssemblyAI job submission failed with status {}: {}",
                status, response_text
            );
            return Err(Self::stage_error(
                ProviderStage::Job,
                format!("status {status}: {response_text}"),
            ));
        }

        let transcript_response: TranscriptResponse =
            serde_json::from_str(&response_text).context("Failed to parse job response")?;

        debug!("Transcription job submitted: {}", transcript_response.id);
        Ok(transcript_response.id)
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobState> {
        let poll_url = format!("{}/transcript/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&poll_url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Poll, e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| Self::stage_error(ProviderStage::Poll, e.to_string()))?;

        if !status.is_success() {
            error!(
                "AssemblyAI poll failed with status {}: {}",
                status, response_text
            );
            return Err(Self::stage_error(
                ProviderStage::Poll,
                format!("status {status}: {response_text}"),
            ));
        }

        let transcript_response: TranscriptResponse =
            serde_json::from_str(&response_text).context("Failed to parse poll response")?;

        let state = match transcript_response.status {
            TranscriptStatus::Queued => JobState::Queued,
            TranscriptStatus::Processing => JobState::Processing,
            TranscriptStatus::Completed => JobState::Completed {
                utterances: transcript_response
                    .utterances
                    .unwrap_or_default()
                    .into_iter()
                    .map(|u| ProviderUtterance {
                        speaker: u.speaker,
                        start_ms: u.start,
                        end_ms: u.end,
                        text: u.text,
                    })
                    .collect(),
                duration_seconds: transcript_response.audio_duration.unwrap_or(0.0) as u64,
            },
            TranscriptStatus::Error => JobState::Error {
                message: transcript_response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
        };

        Ok(state)
    }
}

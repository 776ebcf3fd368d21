//! Transcription orchestrator.
//!
//! Drives a remote transcription job (upload, job creation, poll loop) to
//! completion and materializes the result as a `TranscriptDoc`, recording
//! each transition in the registry. The poll loop is a plain await loop:
//! callers cancel the local wait by dropping the future (the remote job
//! keeps running regardless).

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub mod providers;

pub use providers::{AssemblyAiProvider, JobState, ProviderUtterance, TranscriptionProvider};

use crate::config::TranscriptionConfig;
use crate::db::{AudioFileRepository, TranscriptRepository};
use crate::error::{PipelineError, ProviderStage};
use crate::transcript::{Speaker, TranscriptDoc, Utterance};

pub struct TranscriptionOrchestrator {
    provider: Box<dyn TranscriptionProvider>,
    poll_interval: Duration,
    /// None = wait indefinitely (reference behavior, opt-in via config 0).
    poll_timeout: Option<Duration>,
}

impl TranscriptionOrchestrator {
    pub fn new(
        provider: Box<dyn TranscriptionProvider>,
        poll_interval: Duration,
        poll_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            poll_interval,
            poll_timeout,
        }
    }

    /// Build an orchestrator from config. Only the AssemblyAI provider is
    /// currently wired up.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self> {
        let provider: Box<dyn TranscriptionProvider> = match config.provider.as_str() {
            "assembly-ai" => {
                let api_key = config
                    .api_key
                    .clone()
                    .context("api_key is required for the assembly-ai provider")?;
                Box::new(AssemblyAiProvider::new(api_key, config.api_endpoint.clone()))
            }
            other => bail!(
                "Unknown transcription provider '{}'. Supported providers: assembly-ai",
                other
            ),
        };

        let timeout = match config.poll_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self::new(
            provider,
            Duration::from_secs(config.poll_interval_seconds.max(1)),
            timeout,
        ))
    }

    /// Run the three remote steps end to end and return the transcript
    /// document. No registry access; see `transcribe_and_record`.
    pub async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptDoc> {
        if !audio_path.exists() {
            return Err(PipelineError::ArtifactNotFound(audio_path.to_path_buf()).into());
        }

        info!(
            "Transcribing {:?} via {}",
            audio_path,
            self.provider.name()
        );

        let upload_ref = self.provider.upload(audio_path).await?;
        let job_id = self.provider.submit_job(&upload_ref).await?;
        info!("Transcription job created: {}", job_id);

        let started = std::time::Instant::now();
        loop {
            match self.provider.poll_job(&job_id).await? {
                JobState::Completed {
                    utterances,
                    duration_seconds,
                } => {
                    info!(
                        "Transcription complete: {} utterances, {}s of audio",
                        utterances.len(),
                        duration_seconds
                    );
                    return Ok(doc_from_utterances(audio_path, &utterances, duration_seconds));
                }
                JobState::Error { message } => {
                    return Err(PipelineError::Provider {
                        stage: ProviderStage::Remote,
                        message,
                    }
                    .into());
                }
                state => {
                    debug!("Job {} still {:?}, waiting", job_id, state);
                    if let Some(timeout) = self.poll_timeout {
                        if started.elapsed() >= timeout {
                            warn!(
                                "Gave up polling job {} after {}s (remote job not cancelled)",
                                job_id,
                                timeout.as_secs()
                            );
                            return Err(PipelineError::Provider {
                                stage: ProviderStage::PollTimeout,
                                message: format!(
                                    "job {} not finished after {}s",
                                    job_id,
                                    timeout.as_secs()
                                ),
                            }
                            .into());
                        }
                    }
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Transcribe one audio file and record every transition: the audio
    /// file is registered up front (upsert), the transcript document is
    /// written under `transcripts_dir`, and `transcribed_at` is set only
    /// once everything else has succeeded. A provider failure leaves the
    /// audio row pending and registers no transcript.
    pub async fn transcribe_and_record(
        &self,
        conn: &Connection,
        audio_path: &Path,
        transcripts_dir: &Path,
    ) -> Result<PathBuf> {
        let audio_id = AudioFileRepository::register(conn, audio_path)?;

        let doc = self.transcribe(audio_path).await?;

        let transcript_path = transcript_output_path(audio_path, transcripts_dir);
        doc.save(&transcript_path)?;

        TranscriptRepository::register(conn, &transcript_path, Some(audio_id))?;
        AudioFileRepository::mark_transcribed(conn, audio_path, &transcript_path)?;

        info!("Transcript saved: {:?}", transcript_path);
        Ok(transcript_path)
    }
}

/// Convert provider utterances into the internal transcript shape: the
/// speaker roster is the distinct set of provider ids (unnamed), and times
/// are normalized from milliseconds to seconds.
fn doc_from_utterances(
    audio_path: &Path,
    utterances: &[ProviderUtterance],
    duration_seconds: u64,
) -> TranscriptDoc {
    let speaker_ids: BTreeSet<&str> = utterances.iter().map(|u| u.speaker.as_str()).collect();

    TranscriptDoc {
        source_file: audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| audio_path.to_string_lossy().to_string()),
        transcribed_at: Utc::now(),
        duration_seconds,
        labeled: false,
        speakers: speaker_ids
            .into_iter()
            .map(|id| Speaker {
                id: id.to_string(),
                name: None,
            })
            .collect(),
        utterances: utterances
            .iter()
            .map(|u| Utterance {
                speaker: u.speaker.clone(),
                start: u.start_ms as f64 / 1000.0,
                end: u.end_ms as f64 / 1000.0,
                text: u.text.clone(),
            })
            .collect(),
    }
}

fn transcript_output_path(audio_path: &Path, transcripts_dir: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let timestamp = Local::now().format("%Y-%m-%d-%H-%M");
    transcripts_dir.join(format!("{timestamp}-{stem}-transcript.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(speaker: &str, start_ms: u64, end_ms: u64, text: &str) -> ProviderUtterance {
        ProviderUtterance {
            speaker: speaker.to_string(),
            start_ms,
            end_ms,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_doc_has_distinct_unnamed_speakers() {
        let utterances = vec![
            utterance("B", 0, 1000, "one"),
            utterance("A", 1000, 2000, "two"),
            utterance("B", 2000, 3000, "three"),
        ];
        let doc = doc_from_utterances(Path::new("/r/m.mp4"), &utterances, 3);

        let ids: Vec<&str> = doc.speakers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(doc.speakers.iter().all(|s| s.name.is_none()));
        assert!(!doc.labeled);
        assert_eq!(doc.source_file, "m.mp4");
    }

    #[test]
    fn test_doc_times_in_seconds() {
        let utterances = vec![utterance("A", 1500, 4250, "hello")];
        let doc = doc_from_utterances(Path::new("/r/m.mp4"), &utterances, 4);
        assert!((doc.utterances[0].start - 1.5).abs() < f64::EPSILON);
        assert!((doc.utterances[0].end - 4.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_transcript_output_path_uses_stem() {
        let path = transcript_output_path(Path::new("/r/standup.mp4"), Path::new("/t"));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with("-standup-transcript.json"));
        assert!(path.starts_with("/t"));
    }
}

//! End-to-end pipeline tests: transcribe, label, summarize against a
//! scripted provider, with lifecycle ordering checked at every step.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use scriba::db::{self, AudioFileRepository, TranscriptRepository};
use scriba::error::PipelineError;
use scriba::labeling;
use scriba::summarize::{self, SummaryProvider};
use scriba::transcript::TranscriptDoc;
use scriba::transcription::{
    JobState, ProviderUtterance, TranscriptionOrchestrator, TranscriptionProvider,
};

/// Provider that completes after one queued poll with a two-speaker meeting.
struct TwoSpeakerProvider {
    polls_until_done: std::sync::atomic::AtomicU32,
}

impl TwoSpeakerProvider {
    fn new(polls: u32) -> Self {
        Self {
            polls_until_done: std::sync::atomic::AtomicU32::new(polls),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for TwoSpeakerProvider {
    fn name(&self) -> &'static str {
        "two-speaker"
    }

    async fn upload(&self, audio_path: &Path) -> Result<String> {
        Ok(format!("upload://{}", audio_path.display()))
    }

    async fn submit_job(&self, _upload_ref: &str) -> Result<String> {
        Ok("job-42".to_string())
    }

    async fn poll_job(&self, _job_id: &str) -> Result<JobState> {
        use std::sync::atomic::Ordering;
        if self.polls_until_done.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        })
        .is_ok()
        {
            return Ok(JobState::Processing);
        }
        Ok(JobState::Completed {
            utterances: vec![
                ProviderUtterance {
                    speaker: "A".to_string(),
                    start_ms: 0,
                    end_ms: 4000,
                    text: "Let's review the roadmap.".to_string(),
                },
                ProviderUtterance {
                    speaker: "B".to_string(),
                    start_ms: 4200,
                    end_ms: 9000,
                    text: "I'll take the first item.".to_string(),
                },
                ProviderUtterance {
                    speaker: "A".to_string(),
                    start_ms: 9100,
                    end_ms: 12000,
                    text: "Sounds good.".to_string(),
                },
            ],
            duration_seconds: 12,
        })
    }
}

struct CannedSummarizer(&'static str);

#[async_trait]
impl SummaryProvider for CannedSummarizer {
    async fn summarize(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn orchestrator(polls: u32) -> TranscriptionOrchestrator {
    TranscriptionOrchestrator::new(
        Box::new(TwoSpeakerProvider::new(polls)),
        Duration::from_millis(1),
        None,
    )
}

struct Fixture {
    _dir: TempDir,
    conn: Connection,
    audio: PathBuf,
    transcripts_dir: PathBuf,
    summaries_dir: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let conn = db::open_at(&dir.path().join("scriba.db")).unwrap();
    let audio = dir.path().join("roadmap-sync.mp4");
    std::fs::write(&audio, b"audio").unwrap();
    let transcripts_dir = dir.path().join("transcripts");
    let summaries_dir = dir.path().join("summaries");
    Fixture {
        conn,
        audio,
        transcripts_dir,
        summaries_dir,
        _dir: dir,
    }
}

async fn transcribe(fx: &Fixture) -> PathBuf {
    orchestrator(2)
        .transcribe_and_record(&fx.conn, &fx.audio, &fx.transcripts_dir)
        .await
        .unwrap()
}

fn label_all(conn: &Connection, transcript_path: &Path) -> TranscriptDoc {
    let mut doc = TranscriptDoc::load(transcript_path).unwrap();
    labeling::assign_name(&mut doc, "A", "Alice").unwrap();
    labeling::assign_name(&mut doc, "B", "Bob").unwrap();
    labeling::finalize_labeling(conn, &mut doc, transcript_path).unwrap();
    doc
}

#[tokio::test]
async fn transcription_registers_and_marks() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;

    assert!(transcript_path.exists());
    assert!(AudioFileRepository::is_transcribed(&fx.conn, &fx.audio).unwrap());

    let record = TranscriptRepository::get(&fx.conn, &transcript_path)
        .unwrap()
        .unwrap();
    assert!(record.labeled_at.is_none());
    assert!(record.summarized_at.is_none());

    let doc = TranscriptDoc::load(&transcript_path).unwrap();
    assert_eq!(doc.utterances.len(), 3);
    assert_eq!(doc.speakers.len(), 2);
    assert!(!doc.labeled);
}

#[tokio::test]
async fn summarize_before_labeling_is_rejected() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;

    let err = summarize::summarize_transcript(
        &fx.conn,
        &CannedSummarizer("summary"),
        &transcript_path,
        "Roadmap Sync",
        &fx.summaries_dir,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::LabelingIncomplete { .. })
    ));
    let record = TranscriptRepository::get(&fx.conn, &transcript_path)
        .unwrap()
        .unwrap();
    assert!(record.summarized_at.is_none());
}

#[tokio::test]
async fn finalize_requires_every_speaker_named() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;

    let mut doc = TranscriptDoc::load(&transcript_path).unwrap();
    labeling::assign_name(&mut doc, "A", "Alice").unwrap();
    let err = labeling::finalize_labeling(&fx.conn, &mut doc, &transcript_path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::LabelingIncomplete { unnamed: 1 })
    ));

    // Nothing was persisted by the failed attempt.
    let reloaded = TranscriptDoc::load(&transcript_path).unwrap();
    assert!(!reloaded.labeled);
    assert_eq!(reloaded.utterances[0].speaker, "A");
}

#[tokio::test]
async fn full_pipeline_to_summary() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;
    label_all(&fx.conn, &transcript_path);

    let reloaded = TranscriptDoc::load(&transcript_path).unwrap();
    assert!(reloaded.labeled);
    assert_eq!(reloaded.utterances[0].speaker, "Alice");
    assert_eq!(reloaded.utterances[1].speaker, "Bob");

    let summary_path = summarize::summarize_transcript(
        &fx.conn,
        &CannedSummarizer("### Meeting Title\nRoadmap Sync\n\n- Bob took the first item."),
        &transcript_path,
        "fallback title",
        &fx.summaries_dir,
        None,
    )
    .await
    .unwrap();

    let content = std::fs::read_to_string(&summary_path).unwrap();
    assert!(content.contains("title: Roadmap Sync"));
    assert!(content.contains("participants: Alice, Bob"));

    let record = TranscriptRepository::get(&fx.conn, &transcript_path)
        .unwrap()
        .unwrap();
    assert!(record.labeled_at.is_some());
    assert!(record.summarized_at.is_some());
}

#[tokio::test]
async fn rename_after_summary_updates_both_artifacts() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;
    label_all(&fx.conn, &transcript_path);

    summarize::summarize_transcript(
        &fx.conn,
        &CannedSummarizer("Bob took the first item. Bobby was not present."),
        &transcript_path,
        "Roadmap Sync",
        &fx.summaries_dir,
        None,
    )
    .await
    .unwrap();

    let mut doc = TranscriptDoc::load(&transcript_path).unwrap();
    let assignment = labeling::assign_name(&mut doc, "B", "Robert").unwrap();
    assert_eq!(assignment.previous.as_deref(), Some("Bob"));
    labeling::apply_rename(&mut doc, &assignment);
    doc.save(&transcript_path).unwrap();

    let renames = labeling::rename_tokens(&assignment);
    let summary_path = labeling::rename_in_summary_file(&fx.conn, &transcript_path, &renames)
        .unwrap()
        .expect("summary should exist");

    let reloaded = TranscriptDoc::load(&transcript_path).unwrap();
    assert_eq!(reloaded.utterances[1].speaker, "Robert");

    // Whole-token rename: "Bobby" survives.
    let summary = std::fs::read_to_string(&summary_path).unwrap();
    assert!(summary.contains("Robert took the first item."));
    assert!(summary.contains("Bobby was not present."));
}

#[tokio::test]
async fn status_queries_track_lifecycle() {
    let fx = fixture();

    AudioFileRepository::register(&fx.conn, &fx.audio).unwrap();
    assert_eq!(AudioFileRepository::pending_count(&fx.conn).unwrap(), 1);

    let transcript_path = transcribe(&fx).await;
    assert_eq!(AudioFileRepository::pending_count(&fx.conn).unwrap(), 0);
    assert_eq!(TranscriptRepository::unlabeled_count(&fx.conn).unwrap(), 1);
    assert_eq!(TranscriptRepository::unsummarized_count(&fx.conn).unwrap(), 0);

    label_all(&fx.conn, &transcript_path);
    assert_eq!(TranscriptRepository::unlabeled_count(&fx.conn).unwrap(), 0);
    assert_eq!(TranscriptRepository::unsummarized_count(&fx.conn).unwrap(), 1);

    summarize::summarize_transcript(
        &fx.conn,
        &CannedSummarizer("done"),
        &transcript_path,
        "Roadmap Sync",
        &fx.summaries_dir,
        None,
    )
    .await
    .unwrap();
    assert_eq!(TranscriptRepository::unsummarized_count(&fx.conn).unwrap(), 0);
}

#[tokio::test]
async fn delete_removes_file_and_record() {
    let fx = fixture();
    let transcript_path = transcribe(&fx).await;

    TranscriptRepository::delete(&fx.conn, &transcript_path).unwrap();
    std::fs::remove_file(&transcript_path).unwrap();

    assert!(TranscriptRepository::get(&fx.conn, &transcript_path)
        .unwrap()
        .is_none());
    let err = TranscriptDoc::load(&transcript_path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ArtifactNotFound(_))
    ));
}

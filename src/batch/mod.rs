//! Batch scheduler.
//!
//! Reconciles the watched directory against the registry and drives every
//! untranscribed audio file through the orchestrator, one at a time. A
//! failing file is logged and left in place for the next run; it never
//! aborts the batch. An advisory file lock keeps two concurrent runs (say,
//! a file-watch trigger racing a manual run) from double-processing.

use anyhow::{Context, Result};
use fs2::FileExt;
use rusqlite::Connection;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::db::AudioFileRepository;
use crate::error::PipelineError;
use crate::transcription::TranscriptionOrchestrator;

/// Media types recognized as audio artifacts in the watched directory.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp4", "m4a", "mp3", "wav", "ogg", "webm", "flac"];

pub struct BatchPaths {
    pub watch_dir: PathBuf,
    pub transcripts_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub lock_file: PathBuf,
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Process every pending audio file in the watched directory sequentially.
/// Returns the number of successfully transcribed files. Running again with
/// no new files is a no-op.
pub async fn run_pending(
    conn: &Connection,
    orchestrator: &TranscriptionOrchestrator,
    paths: &BatchPaths,
) -> Result<usize> {
    if !paths.watch_dir.is_dir() {
        return Err(PipelineError::WatchDirMissing(paths.watch_dir.clone()).into());
    }

    let Some(_lock) = acquire_lock(&paths.lock_file)? else {
        warn!("Another batch run holds the lock, skipping this one");
        return Ok(0);
    };

    let mut candidates = scan_watch_dir(&paths.watch_dir)?;
    candidates.sort();
    info!(
        "Batch scan found {} audio file(s) in {:?}",
        candidates.len(),
        paths.watch_dir
    );

    // Per-file failures of any kind are logged and skipped; only the
    // missing watch directory above is fatal for the run.
    let mut processed = 0;
    for audio_path in candidates {
        if let Err(e) = AudioFileRepository::register(conn, &audio_path) {
            error!("Failed to register {:?}: {:#}", audio_path, e);
            continue;
        }
        match AudioFileRepository::is_transcribed(conn, &audio_path) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                error!("Failed to query {:?}: {:#}", audio_path, e);
                continue;
            }
        }

        info!("Processing {:?}", audio_path);
        match orchestrator
            .transcribe_and_record(conn, &audio_path, &paths.transcripts_dir)
            .await
        {
            Ok(transcript_path) => {
                // The transcription stands either way; a file left behind in
                // the watch dir is skipped on rescan via the registry.
                if let Err(e) = archive(&audio_path, &paths.archive_dir) {
                    warn!("Transcribed {:?} but could not archive it: {:#}", audio_path, e);
                }
                info!(
                    "Transcribed {:?} -> {:?}",
                    audio_path.file_name().unwrap_or_default(),
                    transcript_path
                );
                processed += 1;
            }
            Err(e) => {
                // Left unmarked and unmoved so the next run retries it.
                error!("Failed to transcribe {:?}: {:#}", audio_path, e);
            }
        }
    }

    info!("Batch run complete: {} file(s) processed", processed);
    Ok(processed)
}

fn scan_watch_dir(watch_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(watch_dir)
        .with_context(|| format!("Failed to read watch directory {:?}", watch_dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if path.is_file() && is_audio_file(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Take the advisory batch lock. Returns None when another run holds it.
/// The lock releases when the returned handle drops.
fn acquire_lock(lock_path: &Path) -> Result<Option<File>> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
    }
    let file = File::create(lock_path)
        .with_context(|| format!("Failed to create lock file {:?}", lock_path))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(_) => Ok(None),
    }
}

/// Move a transcribed audio file to the archive directory so future scans
/// skip it. Falls back to copy+remove across filesystems.
fn archive(audio_path: &Path, archive_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(archive_dir).context("Failed to create archive directory")?;
    let file_name = audio_path
        .file_name()
        .ok_or_else(|| PipelineError::ArtifactNotFound(audio_path.to_path_buf()))?;
    let dest = archive_dir.join(file_name);

    if std::fs::rename(audio_path, &dest).is_err() {
        std::fs::copy(audio_path, &dest)
            .with_context(|| format!("Failed to copy {:?} to archive", audio_path))?;
        std::fs::remove_file(audio_path)
            .with_context(|| format!("Failed to remove {:?} after archiving", audio_path))?;
    }
    info!("Archived {:?} -> {:?}", audio_path, dest);
    Ok(())
}

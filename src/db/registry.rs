//! Repositories for the `audio_files` and `transcripts` tables.
//!
//! Registration is an upsert keyed by path (INSERT OR IGNORE) so two
//! concurrent callers cannot double-register an artifact. Lifecycle
//! timestamps are guarded by preconditions in the UPDATE statements, not by
//! caller discipline alone: a transcript cannot be marked summarized unless
//! it already carries `labeled_at`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct AudioFileRecord {
    pub id: i64,
    pub path: String,
    pub filename: String,
    pub added_at: String,
    pub transcribed_at: Option<String>,
    pub transcript_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranscriptRecord {
    pub id: i64,
    pub path: String,
    pub audio_file_id: Option<i64>,
    pub created_at: String,
    pub labeled_at: Option<String>,
    pub summarized_at: Option<String>,
    pub summary_path: Option<String>,
}

const AUDIO_COLUMNS: &str = "id, path, filename, added_at, transcribed_at, transcript_path";
const TRANSCRIPT_COLUMNS: &str =
    "id, path, audio_file_id, created_at, labeled_at, summarized_at, summary_path";

fn audio_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AudioFileRecord> {
    Ok(AudioFileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        added_at: row.get(3)?,
        transcribed_at: row.get(4)?,
        transcript_path: row.get(5)?,
    })
}

fn transcript_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscriptRecord> {
    Ok(TranscriptRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        audio_file_id: row.get(2)?,
        created_at: row.get(3)?,
        labeled_at: row.get(4)?,
        summarized_at: row.get(5)?,
        summary_path: row.get(6)?,
    })
}

pub struct AudioFileRepository;

impl AudioFileRepository {
    /// Register an audio file, returning its row id. Idempotent: an already
    /// registered path keeps its single existing row.
    pub fn register(conn: &Connection, path: &Path) -> Result<i64> {
        let path_str = path.to_string_lossy();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.to_string());

        conn.execute(
            "INSERT OR IGNORE INTO audio_files (path, filename) VALUES (?1, ?2)",
            params![path_str.as_ref(), filename],
        )
        .context("Failed to register audio file")?;

        Self::id_for(conn, path)?.ok_or_else(|| {
            PipelineError::StoreIntegrity(format!(
                "audio file {} missing after upsert",
                path.display()
            ))
            .into()
        })
    }

    pub fn id_for(conn: &Connection, path: &Path) -> Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM audio_files WHERE path = ?1",
            params![path.to_string_lossy().as_ref()],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query audio file id")
    }

    pub fn get(conn: &Connection, path: &Path) -> Result<Option<AudioFileRecord>> {
        conn.query_row(
            &format!("SELECT {AUDIO_COLUMNS} FROM audio_files WHERE path = ?1"),
            params![path.to_string_lossy().as_ref()],
            audio_from_row,
        )
        .optional()
        .context("Failed to query audio file")
    }

    pub fn is_transcribed(conn: &Connection, path: &Path) -> Result<bool> {
        let transcribed: Option<Option<String>> = conn
            .query_row(
                "SELECT transcribed_at FROM audio_files WHERE path = ?1",
                params![path.to_string_lossy().as_ref()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query transcription state")?;
        Ok(matches!(transcribed, Some(Some(_))))
    }

    /// Record a successful transcription. Fails if the audio file was never
    /// registered; `transcribed_at` is only ever set on an existing row.
    pub fn mark_transcribed(
        conn: &Connection,
        audio_path: &Path,
        transcript_path: &Path,
    ) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE audio_files
                 SET transcribed_at = CURRENT_TIMESTAMP, transcript_path = ?1
                 WHERE path = ?2",
                params![
                    transcript_path.to_string_lossy().as_ref(),
                    audio_path.to_string_lossy().as_ref()
                ],
            )
            .context("Failed to mark audio file transcribed")?;
        if changed == 0 {
            return Err(PipelineError::ArtifactNotFound(audio_path.to_path_buf()).into());
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, path: &Path) -> Result<()> {
        conn.execute(
            "DELETE FROM audio_files WHERE path = ?1",
            params![path.to_string_lossy().as_ref()],
        )
        .context("Failed to delete audio file record")?;
        Ok(())
    }

    /// Audio files with no transcription recorded, oldest first.
    pub fn pending(conn: &Connection) -> Result<Vec<AudioFileRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {AUDIO_COLUMNS} FROM audio_files \
                 WHERE transcribed_at IS NULL ORDER BY added_at ASC, id ASC"
            ))
            .context("Failed to prepare pending query")?;
        let rows = stmt
            .query_map([], audio_from_row)
            .context("Failed to query pending audio files")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to map pending rows")
    }

    pub fn pending_count(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM audio_files WHERE transcribed_at IS NULL",
            [],
            |row| row.get(0),
        )
        .context("Failed to count pending audio files")
    }
}

pub struct TranscriptRepository;

impl TranscriptRepository {
    /// Register a transcript, returning its row id. Upsert keyed by path.
    pub fn register(conn: &Connection, path: &Path, audio_file_id: Option<i64>) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO transcripts (path, audio_file_id) VALUES (?1, ?2)",
            params![path.to_string_lossy().as_ref(), audio_file_id],
        )
        .context("Failed to register transcript")?;

        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM transcripts WHERE path = ?1",
                params![path.to_string_lossy().as_ref()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query transcript id")?;

        id.ok_or_else(|| {
            PipelineError::StoreIntegrity(format!(
                "transcript {} missing after upsert",
                path.display()
            ))
            .into()
        })
    }

    pub fn get(conn: &Connection, path: &Path) -> Result<Option<TranscriptRecord>> {
        conn.query_row(
            &format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE path = ?1"),
            params![path.to_string_lossy().as_ref()],
            transcript_from_row,
        )
        .optional()
        .context("Failed to query transcript")
    }

    pub fn mark_labeled(conn: &Connection, path: &Path) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE transcripts SET labeled_at = CURRENT_TIMESTAMP WHERE path = ?1",
                params![path.to_string_lossy().as_ref()],
            )
            .context("Failed to mark transcript labeled")?;
        if changed == 0 {
            return Err(PipelineError::ArtifactNotFound(path.to_path_buf()).into());
        }
        Ok(())
    }

    /// Record a generated summary. Refuses unless `labeled_at` is already
    /// set, enforcing the lifecycle ordering at the store boundary.
    pub fn mark_summarized(conn: &Connection, path: &Path, summary_path: &Path) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE transcripts
                 SET summarized_at = CURRENT_TIMESTAMP, summary_path = ?1
                 WHERE path = ?2 AND labeled_at IS NOT NULL",
                params![
                    summary_path.to_string_lossy().as_ref(),
                    path.to_string_lossy().as_ref()
                ],
            )
            .context("Failed to mark transcript summarized")?;

        if changed == 0 {
            return match Self::get(conn, path)? {
                None => Err(PipelineError::ArtifactNotFound(path.to_path_buf()).into()),
                Some(_) => Err(PipelineError::LabelingIncomplete { unnamed: 0 }.into()),
            };
        }
        Ok(())
    }

    pub fn summary_path(conn: &Connection, path: &Path) -> Result<Option<String>> {
        let summary: Option<Option<String>> = conn
            .query_row(
                "SELECT summary_path FROM transcripts WHERE path = ?1",
                params![path.to_string_lossy().as_ref()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query summary path")?;
        Ok(summary.flatten())
    }

    pub fn delete(conn: &Connection, path: &Path) -> Result<()> {
        conn.execute(
            "DELETE FROM transcripts WHERE path = ?1",
            params![path.to_string_lossy().as_ref()],
        )
        .context("Failed to delete transcript record")?;
        Ok(())
    }

    /// Paths of transcripts with no labeling recorded, oldest first.
    pub fn unlabeled(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT path FROM transcripts WHERE labeled_at IS NULL \
                 ORDER BY created_at ASC, id ASC",
            )
            .context("Failed to prepare unlabeled query")?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to query unlabeled transcripts")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to map unlabeled rows")
    }

    /// Paths of labeled but unsummarized transcripts, oldest first.
    pub fn unsummarized(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT path FROM transcripts \
                 WHERE labeled_at IS NOT NULL AND summarized_at IS NULL \
                 ORDER BY created_at ASC, id ASC",
            )
            .context("Failed to prepare unsummarized query")?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to query unsummarized transcripts")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to map unsummarized rows")
    }

    pub fn unlabeled_count(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM transcripts WHERE labeled_at IS NULL",
            [],
            |row| row.get(0),
        )
        .context("Failed to count unlabeled transcripts")
    }

    pub fn unsummarized_count(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM transcripts \
             WHERE labeled_at IS NOT NULL AND summarized_at IS NULL",
            [],
            |row| row.get(0),
        )
        .context("Failed to count unsummarized transcripts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use std::path::PathBuf;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_register_is_idempotent() {
        let conn = setup();
        let path = PathBuf::from("/r/a.mp4");

        let first = AudioFileRepository::register(&conn, &path).unwrap();
        let second = AudioFileRepository::register(&conn, &path).unwrap();
        assert_eq!(first, second);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM audio_files WHERE path = '/r/a.mp4'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_mark_transcribed_sets_timestamp_and_ref() {
        let conn = setup();
        let audio = PathBuf::from("/r/a.mp4");
        let transcript = PathBuf::from("/t/a-transcript.json");

        AudioFileRepository::register(&conn, &audio).unwrap();
        assert!(!AudioFileRepository::is_transcribed(&conn, &audio).unwrap());

        AudioFileRepository::mark_transcribed(&conn, &audio, &transcript).unwrap();
        assert!(AudioFileRepository::is_transcribed(&conn, &audio).unwrap());

        let record = AudioFileRepository::get(&conn, &audio).unwrap().unwrap();
        assert_eq!(
            record.transcript_path.as_deref(),
            Some("/t/a-transcript.json")
        );
    }

    #[test]
    fn test_mark_transcribed_unregistered_fails() {
        let conn = setup();
        let err = AudioFileRepository::mark_transcribed(
            &conn,
            Path::new("/r/ghost.mp4"),
            Path::new("/t/ghost.json"),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_pending_excludes_transcribed() {
        let conn = setup();
        let a = PathBuf::from("/r/a.mp4");
        let b = PathBuf::from("/r/b.mp4");
        AudioFileRepository::register(&conn, &a).unwrap();
        AudioFileRepository::register(&conn, &b).unwrap();

        AudioFileRepository::mark_transcribed(&conn, &a, Path::new("/t/a.json")).unwrap();

        let pending = AudioFileRepository::pending(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, "/r/b.mp4");
        assert_eq!(AudioFileRepository::pending_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_summarize_requires_labeled() {
        let conn = setup();
        let transcript = PathBuf::from("/t/a.json");
        TranscriptRepository::register(&conn, &transcript, None).unwrap();

        let err =
            TranscriptRepository::mark_summarized(&conn, &transcript, Path::new("/s/a.md"))
                .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::LabelingIncomplete { .. })
        ));

        TranscriptRepository::mark_labeled(&conn, &transcript).unwrap();
        TranscriptRepository::mark_summarized(&conn, &transcript, Path::new("/s/a.md")).unwrap();

        let record = TranscriptRepository::get(&conn, &transcript).unwrap().unwrap();
        assert!(record.labeled_at.is_some());
        assert!(record.summarized_at.is_some());
        assert_eq!(record.summary_path.as_deref(), Some("/s/a.md"));
    }

    #[test]
    fn test_unlabeled_and_unsummarized_queries() {
        let conn = setup();
        let a = PathBuf::from("/t/a.json");
        let b = PathBuf::from("/t/b.json");
        TranscriptRepository::register(&conn, &a, None).unwrap();
        TranscriptRepository::register(&conn, &b, None).unwrap();

        assert_eq!(TranscriptRepository::unlabeled(&conn).unwrap().len(), 2);
        assert_eq!(TranscriptRepository::unsummarized(&conn).unwrap().len(), 0);

        TranscriptRepository::mark_labeled(&conn, &a).unwrap();
        assert_eq!(TranscriptRepository::unlabeled(&conn).unwrap().len(), 1);
        assert_eq!(
            TranscriptRepository::unsummarized(&conn).unwrap(),
            vec!["/t/a.json".to_string()]
        );
        assert_eq!(TranscriptRepository::unsummarized_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_delete_removes_row() {
        let conn = setup();
        let path = PathBuf::from("/r/a.mp4");
        AudioFileRepository::register(&conn, &path).unwrap();
        AudioFileRepository::delete(&conn, &path).unwrap();
        assert!(AudioFileRepository::get(&conn, &path).unwrap().is_none());
    }
}

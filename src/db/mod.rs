//! SQLite artifact registry.
//!
//! Source of truth for every audio file and transcript in the pipeline. Raw
//! SQL with rusqlite, no ORM. The filesystem is a derived view reconciled
//! against these tables, never the reverse.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub mod registry;

pub use registry::{AudioFileRecord, AudioFileRepository, TranscriptRecord, TranscriptRepository};

/// Open (creating if needed) the registry at the default location.
pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;
    open_at(&db_path)
}

/// Open a registry database at an explicit path.
pub fn open_at(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audio_files (
            id INTEGER PRIMARY KEY,
            path TEXT UNIQUE NOT NULL,
            filename TEXT NOT NULL,
            added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            transcribed_at TIMESTAMP,
            transcript_path TEXT
        )",
        [],
    )
    .context("Failed to create audio_files table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transcripts (
            id INTEGER PRIMARY KEY,
            path TEXT UNIQUE NOT NULL,
            audio_file_id INTEGER,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            labeled_at TIMESTAMP,
            summarized_at TIMESTAMP,
            summary_path TEXT,
            FOREIGN KEY (audio_file_id) REFERENCES audio_files(id)
        )",
        [],
    )
    .context("Failed to create transcripts table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audio_files_path ON audio_files(path)",
        [],
    )
    .context("Failed to create audio_files path index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transcripts_labeled ON transcripts(labeled_at)",
        [],
    )
    .context("Failed to create transcripts labeled index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('audio_files', 'transcripts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }
}

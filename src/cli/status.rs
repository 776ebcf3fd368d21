use anyhow::Result;

use super::args::DeleteCliArgs;
use crate::db::{self, AudioFileRepository, TranscriptRepository};
use crate::error::PipelineError;

pub fn handle_status_command() -> Result<()> {
    let conn = db::init_db()?;

    let pending = AudioFileRepository::pending(&conn)?;
    println!("Audio files awaiting transcription: {}", pending.len());
    for record in &pending {
        println!("  {}", record.path);
    }

    let unlabeled = TranscriptRepository::unlabeled(&conn)?;
    println!("Transcripts awaiting labels: {}", unlabeled.len());
    for path in &unlabeled {
        println!("  {path}");
    }

    let unsummarized = TranscriptRepository::unsummarized(&conn)?;
    println!("Labeled transcripts awaiting summary: {}", unsummarized.len());
    for path in &unsummarized {
        println!("  {path}");
    }

    Ok(())
}

/// Remove an artifact and its registry record together, whichever table it
/// lives in. The file and the row never outlive each other.
pub fn handle_delete_command(args: DeleteCliArgs) -> Result<()> {
    let conn = db::init_db()?;

    let audio_row = AudioFileRepository::get(&conn, &args.path)?.is_some();
    let transcript_row = TranscriptRepository::get(&conn, &args.path)?.is_some();
    let file_exists = args.path.exists();

    if !audio_row && !transcript_row && !file_exists {
        return Err(PipelineError::ArtifactNotFound(args.path.clone()).into());
    }

    if file_exists {
        std::fs::remove_file(&args.path)?;
    }
    if audio_row {
        AudioFileRepository::delete(&conn, &args.path)?;
    }
    if transcript_row {
        TranscriptRepository::delete(&conn, &args.path)?;
    }

    println!("Deleted {}", args.path.display());
    Ok(())
}

use anyhow::Result;

use super::args::TranscribeCliArgs;
use crate::batch::{self, BatchPaths};
use crate::config::Config;
use crate::db;
use crate::global;
use crate::transcription::TranscriptionOrchestrator;

pub async fn handle_transcribe_command(args: TranscribeCliArgs) -> Result<()> {
    let config = Config::load()?;
    let conn = db::init_db()?;
    let orchestrator = TranscriptionOrchestrator::from_config(&config.transcription)?;

    let transcript_path = orchestrator
        .transcribe_and_record(&conn, &args.audio, &config.transcripts_dir()?)
        .await?;

    println!("Transcript saved: {}", transcript_path.display());
    println!("Run `scriba label {}` to name the speakers.", transcript_path.display());
    Ok(())
}

pub async fn handle_process_pending_command() -> Result<()> {
    let config = Config::load()?;
    let conn = db::init_db()?;
    let orchestrator = TranscriptionOrchestrator::from_config(&config.transcription)?;

    let paths = BatchPaths {
        watch_dir: config.watch_dir()?,
        transcripts_dir: config.transcripts_dir()?,
        archive_dir: config.archive_dir()?,
        lock_file: global::batch_lock_file()?,
    };

    let processed = batch::run_pending(&conn, &orchestrator, &paths).await?;
    println!("Processed {processed} file(s).");
    Ok(())
}

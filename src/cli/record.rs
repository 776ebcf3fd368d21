use anyhow::Result;

use crate::config::Config;
use crate::db::{self, AudioFileRepository};
use crate::global;
use crate::recording::{RecordingManager, RecordingStatus};

fn manager(config: &Config) -> Result<RecordingManager> {
    Ok(RecordingManager::new(
        global::session_file()?,
        config.watch_dir()?,
        config.recording.clone(),
    ))
}

pub fn handle_start_recording_command() -> Result<()> {
    let config = Config::load()?;
    let record = manager(&config)?.start()?;

    println!(
        "Recording started (pid {}): {}",
        record.pid,
        record.output_path.display()
    );
    Ok(())
}

pub fn handle_stop_recording_command() -> Result<()> {
    let config = Config::load()?;
    let outcome = manager(&config)?.stop()?;

    if outcome.artifact_missing {
        println!(
            "Recording stopped, but no audio file was found at {}",
            outcome.output_path.display()
        );
        return Ok(());
    }

    let conn = db::init_db()?;
    AudioFileRepository::register(&conn, &outcome.output_path)?;

    println!("Recording saved: {}", outcome.output_path.display());
    println!("Run `scriba process-pending` to transcribe it.");
    Ok(())
}

pub fn handle_recording_status_command() -> Result<()> {
    let config = Config::load()?;
    match manager(&config)?.status()? {
        RecordingStatus::Idle => println!("No recording in progress."),
        RecordingStatus::Recording { duration, path } => {
            println!(
                "Recording {} ({}s elapsed)",
                path.display(),
                duration.as_secs()
            );
        }
    }
    Ok(())
}

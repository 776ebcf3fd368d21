use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scriba")]
#[command(about = "Record, transcribe, label, and summarize meetings", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Start a background audio recording
    StartRecording,
    /// Stop the active recording and register the audio file
    StopRecording,
    /// Show whether a recording is in progress
    RecordingStatus,
    /// Transcribe a single audio file
    Transcribe(TranscribeCliArgs),
    /// Transcribe every pending audio file in the watched directory
    ProcessPending,
    /// Show the speaker roster of a transcript with sample utterances
    Label(LabelCliArgs),
    /// Assign a display name to a diarized speaker
    AssignName(AssignNameCliArgs),
    /// Finalize labeling once every speaker has a name
    FinalizeLabels(FinalizeLabelsCliArgs),
    /// Generate a Markdown summary for a labeled transcript
    Summarize(SummarizeCliArgs),
    /// Show pipeline progress: pending, unlabeled, unsummarized
    Status,
    /// Delete an artifact and its registry record
    Delete(DeleteCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct TranscribeCliArgs {
    /// Path to the audio file
    pub audio: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct LabelCliArgs {
    /// Path to the transcript document
    pub transcript: PathBuf,
    /// Sample utterances to show per speaker
    #[arg(short, long, default_value = "3")]
    pub samples: usize,
}

#[derive(ClapArgs, Debug)]
pub struct AssignNameCliArgs {
    /// Path to the transcript document
    pub transcript: PathBuf,
    /// Diarized speaker id (e.g. "A")
    pub speaker: String,
    /// Display name to assign
    pub name: String,
}

#[derive(ClapArgs, Debug)]
pub struct FinalizeLabelsCliArgs {
    /// Path to the transcript document
    pub transcript: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct SummarizeCliArgs {
    /// Path to the labeled transcript document
    pub transcript: PathBuf,
    /// Meeting title (overridden if the summary names its own)
    pub title: String,
}

#[derive(ClapArgs, Debug)]
pub struct DeleteCliArgs {
    /// Path to the audio file or transcript to delete
    pub path: PathBuf,
}

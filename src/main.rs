use clap::Parser;
use scriba::cli::{
    handle_assign_name_command, handle_delete_command, handle_finalize_labels_command,
    handle_label_command, handle_process_pending_command, handle_recording_status_command,
    handle_start_recording_command, handle_status_command, handle_stop_recording_command,
    handle_summarize_command, handle_transcribe_command, Cli, CliCommand,
};
use scriba::PipelineError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let result = match cli.command {
        CliCommand::StartRecording => handle_start_recording_command(),
        CliCommand::StopRecording => handle_stop_recording_command(),
        CliCommand::RecordingStatus => handle_recording_status_command(),
        CliCommand::Transcribe(args) => handle_transcribe_command(args).await,
        CliCommand::ProcessPending => handle_process_pending_command().await,
        CliCommand::Label(args) => handle_label_command(args),
        CliCommand::AssignName(args) => handle_assign_name_command(args),
        CliCommand::FinalizeLabels(args) => handle_finalize_labels_command(args),
        CliCommand::Summarize(args) => handle_summarize_command(args).await,
        CliCommand::Status => handle_status_command(),
        CliCommand::Delete(args) => handle_delete_command(args),
        CliCommand::Version => {
            println!("scriba {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<PipelineError>()
            .map(PipelineError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

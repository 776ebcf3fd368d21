pub mod args;

mod label;
mod record;
mod status;
mod summarize;
mod transcribe;

pub use args::{Cli, CliCommand};
pub use label::{handle_assign_name_command, handle_finalize_labels_command, handle_label_command};
pub use record::{
    handle_recording_status_command, handle_start_recording_command, handle_stop_recording_command,
};
pub use status::{handle_delete_command, handle_status_command};
pub use summarize::handle_summarize_command;
pub use transcribe::{handle_process_pending_command, handle_transcribe_command};

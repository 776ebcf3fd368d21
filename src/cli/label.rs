use anyhow::Result;

use super::args::{AssignNameCliArgs, FinalizeLabelsCliArgs, LabelCliArgs};
use crate::db::{self, TranscriptRepository};
use crate::labeling;
use crate::transcript::TranscriptDoc;

pub fn handle_label_command(args: LabelCliArgs) -> Result<()> {
    let doc = TranscriptDoc::load(&args.transcript)?;

    println!(
        "{} speaker(s) in {} ({})",
        doc.speakers.len(),
        args.transcript.display(),
        if doc.labeled { "labeled" } else { "unlabeled" }
    );

    for speaker in &doc.speakers {
        match &speaker.name {
            Some(name) => println!("\nSpeaker {} -> {}", speaker.id, name),
            None => println!("\nSpeaker {} (unnamed)", speaker.id),
        }
        for text in labeling::sample_utterances(&doc, &speaker.id, args.samples)? {
            println!("  \"{text}\"");
        }
    }

    println!(
        "\nAssign names with: scriba assign-name {} <speaker> <name>",
        args.transcript.display()
    );
    Ok(())
}

pub fn handle_assign_name_command(args: AssignNameCliArgs) -> Result<()> {
    let mut doc = TranscriptDoc::load(&args.transcript)?;
    let assignment = labeling::assign_name(&mut doc, &args.speaker, &args.name)?;

    // Past finalization the utterances and any generated summary already
    // carry the old name, so the rename has to chase it through both.
    if doc.labeled {
        labeling::apply_rename(&mut doc, &assignment);

        let conn = db::init_db()?;
        let renames = labeling::rename_tokens(&assignment);
        if let Some(summary_path) =
            labeling::rename_in_summary_file(&conn, &args.transcript, &renames)?
        {
            println!("Updated summary: {}", summary_path.display());
        }
    }

    doc.save(&args.transcript)?;

    match &assignment.previous {
        Some(previous) => println!(
            "Speaker {} renamed: {} -> {}",
            assignment.speaker_id, previous, assignment.name
        ),
        None => println!("Speaker {} named {}", assignment.speaker_id, assignment.name),
    }

    if !doc.labeled {
        if labeling::is_fully_labeled(&doc) {
            println!(
                "All speakers named. Run `scriba finalize-labels {}` to apply.",
                args.transcript.display()
            );
        } else {
            let unnamed = doc.speakers.iter().filter(|s| s.name.is_none()).count();
            println!("{unnamed} speaker(s) still unnamed.");
        }
    }
    Ok(())
}

pub fn handle_finalize_labels_command(args: FinalizeLabelsCliArgs) -> Result<()> {
    let conn = db::init_db()?;
    let mut doc = TranscriptDoc::load(&args.transcript)?;

    // Transcripts produced outside the batch flow may not be registered yet.
    TranscriptRepository::register(&conn, &args.transcript, None)?;
    labeling::finalize_labeling(&conn, &mut doc, &args.transcript)?;

    println!(
        "Labels finalized: {}",
        doc.participants().join(", ")
    );
    Ok(())
}
